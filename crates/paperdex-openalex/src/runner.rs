//! OpenAlex import: works listing → cursor driver → sink

use paperdex_core::{CursorDriver, CursorRun, PageSource, PaperSink, ShutdownFlag};

use crate::api::WorksQuery;
use crate::config::OpenAlexConfig;
use crate::transform::{WorkRow, work_to_paper};

/// Run a works import from `start_cursor` (`*` for a fresh run).
pub fn run<K>(
    config: &OpenAlexConfig,
    start_cursor: &str,
    sink: &mut K,
    shutdown: ShutdownFlag,
) -> CursorRun
where
    K: PaperSink + ?Sized,
{
    let mut works = WorksQuery::new(config.clone());
    run_with(&mut works, config, start_cursor, sink, shutdown)
}

/// Like [`run`] over any works page source.
pub fn run_with<S, K>(
    works: &mut S,
    config: &OpenAlexConfig,
    start_cursor: &str,
    sink: &mut K,
    shutdown: ShutdownFlag,
) -> CursorRun
where
    S: PageSource<Item = WorkRow>,
    K: PaperSink + ?Sized,
{
    let all_works = config.all_works;
    if let Some(filter) = &config.filter {
        log::info!("openalex: filter {filter}");
    }
    let driver = CursorDriver::new(config.driver_config(), shutdown);
    driver.run(works, start_cursor, |row| work_to_paper(row, all_works), sink)
}
