//! Contract consumed by downstream writers.
//!
//! JSON serializers, HTML renderers, and persistence layers all receive
//! the same immutable records through this trait. The parser core carries
//! no dependency on any of them and is fully usable with no adapter at
//! all.

use crate::record::EligibilityResponse;

/// Sink for assembled eligibility records.
pub trait OutputAdapter {
    /// Error the sink can fail with. Use only for failures that make
    /// further writes pointless; per-record data problems are already
    /// carried as diagnostics on the record itself.
    type Error;

    /// Called once per record, in assembly order.
    fn write_record(&mut self, record: &EligibilityResponse) -> Result<(), Self::Error>;

    /// Called after the last record of a parse.
    fn finish(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }
}

/// Drive an adapter over a slice of records.
pub fn emit<A: OutputAdapter>(
    records: &[EligibilityResponse],
    adapter: &mut A,
) -> Result<(), A::Error> {
    for record in records {
        adapter.write_record(record)?;
    }
    adapter.finish()
}
