// Cluster assignment and enrichment.
//
// Both operations compute the new cluster state in memory and record the
// writes on a unit of work. Nothing touches the database until the caller
// commits the unit.

use crate::db::models::{Article, Cluster, ClusterDraft};
use crate::db::unit_of_work::{PendingWrite, UnitOfWork};

use super::MemberFlags;

/// Start a new cluster with `article` as its representative.
pub fn create_cluster(unit: &mut UnitOfWork, article: &Article, flags: MemberFlags) -> ClusterDraft {
    let draft = ClusterDraft {
        user_id: article.user_id,
        main_article_id: article.id,
        main_link: article.link.clone(),
        main_title: article.title.clone(),
        main_date: article.date,
        main_feed_title: article.feed_title.clone(),
        read: flags.read.unwrap_or(false),
        liked: flags.liked,
    };
    unit.push(PendingWrite::CreateCluster(draft.clone()));
    draft
}

/// Fold `article` into an existing cluster.
///
/// The cluster stays read only if the new member is read too, becomes liked
/// as soon as any member is liked, and takes the article as representative
/// when it predates the current one (or when `force_main` is set). The
/// representative can move back in time, never forward.
pub fn enrich(
    unit: &mut UnitOfWork,
    mut cluster: Cluster,
    article: &Article,
    flags: MemberFlags,
    force_main: bool,
) -> Cluster {
    if let Some(read) = flags.read {
        cluster.read = cluster.read && read;
    }
    cluster.liked = cluster.liked || flags.liked;

    if article.date < cluster.main_date || force_main {
        cluster.main_title = article.title.clone();
        cluster.main_date = article.date;
        cluster.main_feed_title = article.feed_title.clone();
        cluster.main_article_id = Some(article.id);
    }

    unit.push(PendingWrite::UpdateCluster(cluster.clone()));
    unit.push(PendingWrite::LinkArticle {
        article_id: article.id,
        cluster_id: cluster.id,
    });
    cluster
}
