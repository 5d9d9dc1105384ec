use crate::core::{Activity, ProcessEntry};
use crate::db::Session;
use crate::error::DbError;

/// Runs one tick: a single transaction around `statement`.
///
/// The transaction is opened first so the statement runs under its snapshot.
/// On any error the transaction is dropped (rolled back) and the error
/// returned; activity stays `Running` since the unit is about to exit.
pub(crate) async fn run_tick(
    session: &mut dyn Session,
    process: &ProcessEntry,
    statement: &str,
) -> Result<u64, DbError> {
    let mut tx = session.begin().await?;
    process.report_activity(Activity::Running, Some(statement));

    let rows = tx.execute(statement).await?;
    tx.commit().await?;

    process.report_activity(Activity::Idle, None);
    Ok(rows)
}
