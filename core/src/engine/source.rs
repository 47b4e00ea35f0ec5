use crate::scan::ScanBatch;

/// Producer of scan batches consumed by the engine.
pub trait ScanSource {
    /// Blocks until the next batch binned at `scan_resolution` Hz is available.
    /// Returns [`ScanBatch::end_of_stream`] when no more data will arrive.
    fn read_batch(&mut self, scan_resolution: f64) -> ScanBatch;

    /// False once the source no longer expects to produce batches.
    fn healthy(&self) -> bool;

    /// Releases source resources. Must be idempotent.
    fn stop(&mut self);
}

impl<S: ScanSource + ?Sized> ScanSource for Box<S> {
    fn read_batch(&mut self, scan_resolution: f64) -> ScanBatch {
        (**self).read_batch(scan_resolution)
    }

    fn healthy(&self) -> bool {
        (**self).healthy()
    }

    fn stop(&mut self) {
        (**self).stop()
    }
}
