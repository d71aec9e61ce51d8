//! Destinations for batches of canonical papers

use crate::record::Paper;

/// Receives converted papers from a driver.
///
/// `write_batch` returns how many papers the destination accepted; a
/// shortfall is not an error. An `Err` means the destination itself is
/// unusable and the current unit of work (page, file) should stop. A sink
/// that wrote part of the batch first reports that with [`PartialWrite`].
pub trait PaperSink {
    fn write_batch(&mut self, papers: Vec<Paper>) -> anyhow::Result<usize>;

    /// Push out anything buffered; returns papers accepted by the flush.
    fn flush(&mut self) -> anyhow::Result<usize> {
        Ok(0)
    }
}

impl<S: PaperSink + ?Sized> PaperSink for &mut S {
    fn write_batch(&mut self, papers: Vec<Paper>) -> anyhow::Result<usize> {
        (**self).write_batch(papers)
    }

    fn flush(&mut self) -> anyhow::Result<usize> {
        (**self).flush()
    }
}

impl<S: PaperSink + ?Sized> PaperSink for Box<S> {
    fn write_batch(&mut self, papers: Vec<Paper>) -> anyhow::Result<usize> {
        (**self).write_batch(papers)
    }

    fn flush(&mut self) -> anyhow::Result<usize> {
        (**self).flush()
    }
}

/// A sink failure after some of the batch was already written.
#[derive(Debug)]
pub struct PartialWrite {
    pub accepted: usize,
    pub error: anyhow::Error,
}

impl std::fmt::Display for PartialWrite {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:#} ({} accepted before the failure)", self.error, self.accepted)
    }
}

impl std::error::Error for PartialWrite {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(self.error.as_ref())
    }
}

/// Papers a failed `write_batch` still managed to write; 0 unless the
/// error is a [`PartialWrite`].
pub fn accepted_before_failure(error: &anyhow::Error) -> usize {
    error
        .downcast_ref::<PartialWrite>()
        .map_or(0, |partial| partial.accepted)
}

/// Collects everything; used for dry runs and tests.
impl PaperSink for Vec<Paper> {
    fn write_batch(&mut self, papers: Vec<Paper>) -> anyhow::Result<usize> {
        let n = papers.len();
        self.extend(papers);
        Ok(n)
    }
}

/// Adapts a closure into a sink.
pub struct FnSink<F>(pub F);

impl<F> PaperSink for FnSink<F>
where
    F: FnMut(Vec<Paper>) -> anyhow::Result<usize>,
{
    fn write_batch(&mut self, papers: Vec<Paper>) -> anyhow::Result<usize> {
        (self.0)(papers)
    }
}

/// Writes every batch to `primary`, mirroring a copy into `mirror`.
///
/// The accepted count is the primary's; a mirror failure is an error too.
pub struct Tee<A, B> {
    pub primary: A,
    pub mirror: B,
}

impl<A, B> Tee<A, B> {
    pub fn new(primary: A, mirror: B) -> Self {
        Self { primary, mirror }
    }

    pub fn into_parts(self) -> (A, B) {
        (self.primary, self.mirror)
    }
}

impl<A: PaperSink, B: PaperSink> PaperSink for Tee<A, B> {
    fn write_batch(&mut self, papers: Vec<Paper>) -> anyhow::Result<usize> {
        self.mirror.write_batch(papers.clone())?;
        self.primary.write_batch(papers)
    }

    fn flush(&mut self) -> anyhow::Result<usize> {
        self.mirror.flush()?;
        self.primary.flush()
    }
}
