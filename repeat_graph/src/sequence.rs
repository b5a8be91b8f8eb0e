//! Sequence storage. Every record is kept on both strands, and
//! the lowest bit of a `SeqId` tells the strand. Thus, `id.rc()` is
//! the reverse complement of `id`.
use crate::{RepeatGraphError, Result};
use bio::io::fasta;
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SeqId(pub u32);

impl SeqId {
    pub fn forward(index: usize) -> Self {
        SeqId((index as u32) << 1)
    }
    pub fn rc(self) -> Self {
        SeqId(self.0 ^ 1)
    }
    pub fn strand(self) -> bool {
        self.0 & 1 == 0
    }
    /// Index of the record this id was created from.
    pub fn record(self) -> usize {
        (self.0 >> 1) as usize
    }
}

impl std::fmt::Display for SeqId {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        let sign = if self.strand() { '+' } else { '-' };
        write!(f, "{}{}", sign, self.record())
    }
}

/// Read-only access to sequences by id.
pub trait SequenceProvider: Sync {
    fn sequence(&self, id: SeqId) -> Result<&[u8]>;
    fn length(&self, id: SeqId) -> Result<usize> {
        self.sequence(id).map(|s| s.len())
    }
    fn name(&self, id: SeqId) -> Result<&str>;
}

#[derive(Debug, Clone)]
struct Record {
    name: String,
    // [template, revcmp]
    seq: [Vec<u8>; 2],
}

#[derive(Debug, Clone, Default)]
pub struct SequenceContainer {
    records: Vec<Record>,
}

impl SequenceProvider for SequenceContainer {
    fn sequence(&self, id: SeqId) -> Result<&[u8]> {
        let strand = if id.strand() { 0 } else { 1 };
        self.records
            .get(id.record())
            .map(|r| r.seq[strand].as_slice())
            .ok_or(RepeatGraphError::NotFound(id))
    }
    fn name(&self, id: SeqId) -> Result<&str> {
        self.records
            .get(id.record())
            .map(|r| r.name.as_str())
            .ok_or(RepeatGraphError::NotFound(id))
    }
}

impl SequenceContainer {
    pub fn new() -> Self {
        Self::default()
    }
    pub fn len(&self) -> usize {
        self.records.len()
    }
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
    /// Appends all the records in the given FASTA file. Returns the number of records loaded.
    pub fn load_from_file<P: AsRef<Path> + std::fmt::Debug>(&mut self, path: P) -> Result<usize> {
        let reader = fasta::Reader::from_file(path)
            .map_err(|why| std::io::Error::new(std::io::ErrorKind::Other, why.to_string()))?;
        let mut count = 0;
        for record in reader.records() {
            let record = record?;
            self.add_sequence(record.id(), record.seq())?;
            count += 1;
        }
        debug!("Loaded {} sequences", count);
        Ok(count)
    }
    pub fn add_sequence(&mut self, name: &str, seq: &[u8]) -> Result<SeqId> {
        let template: Vec<u8> = seq.iter().map(|b| b.to_ascii_uppercase()).collect();
        if let Some(position) = template
            .iter()
            .position(|b| !matches!(b, b'A' | b'C' | b'G' | b'T' | b'N'))
        {
            return Err(RepeatGraphError::InvalidSequence {
                name: name.to_string(),
                base: template[position] as char,
                position,
            });
        }
        let revcmp = revcmp(&template);
        self.records.push(Record {
            name: name.to_string(),
            seq: [template, revcmp],
        });
        Ok(SeqId::forward(self.records.len() - 1))
    }
    /// Ids of the forward strands.
    pub fn ids(&self) -> impl Iterator<Item = SeqId> + '_ {
        (0..self.records.len()).map(SeqId::forward)
    }
    pub fn total_length(&self) -> usize {
        self.records.iter().map(|r| r.seq[0].len()).sum()
    }
}

pub fn revcmp(seq: &[u8]) -> Vec<u8> {
    seq.iter()
        .rev()
        .map(|&e| match e {
            b'A' | b'a' => b'T',
            b'C' | b'c' => b'G',
            b'G' | b'g' => b'C',
            b'T' | b't' => b'A',
            _ => b'N',
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    #[test]
    fn strands() {
        let mut container = SequenceContainer::new();
        let id = container.add_sequence("ctg1", b"aacgtT").unwrap();
        assert!(id.strand());
        assert_eq!(id.rc().rc(), id);
        assert_eq!(container.sequence(id).unwrap(), b"AACGTT");
        assert_eq!(container.sequence(id.rc()).unwrap(), b"AACGTT");
        let id2 = container.add_sequence("ctg2", b"AAAC").unwrap();
        assert_eq!(container.sequence(id2.rc()).unwrap(), b"GTTT");
        assert_eq!(container.length(id2).unwrap(), 4);
        assert_eq!(container.name(id2.rc()).unwrap(), "ctg2");
        assert_eq!(container.ids().count(), 2);
    }
    #[test]
    fn errors() {
        let mut container = SequenceContainer::new();
        assert!(matches!(
            container.sequence(SeqId(4)),
            Err(RepeatGraphError::NotFound(_))
        ));
        assert!(container.add_sequence("bad", b"ACGU").is_err());
    }
}
