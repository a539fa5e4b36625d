use super::Record;

/// Writes a record to an output destination.
pub trait Recorder {
    /// Write a record.
    fn write(&mut self, record: Record);
}
