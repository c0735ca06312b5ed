use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::Path;

use flate2::read::MultiGzDecoder;

use crate::error::FastaError;
use crate::types::Otu;

/// Opens a text input, transparently decompressing it when the path ends in `.gz`.
pub fn open_input<P: AsRef<Path>>(path: P) -> io::Result<Box<dyn BufRead>> {
    let path = path.as_ref();
    let f = File::open(path)?;

    let is_gz = path
        .extension()
        .map(|ext| ext == "gz")
        .unwrap_or(false);

    if is_gz {
        Ok(Box::new(BufReader::new(MultiGzDecoder::new(f))))
    } else {
        Ok(Box::new(BufReader::new(f)))
    }
}

/// Reads FASTA records from a file (plain or `.gz`) into OTUs, in file order.
pub fn read_fasta_otus<P: AsRef<Path>>(path: P) -> Result<Vec<Otu>, FastaError> {
    let reader = open_input(path)?;
    parse_fasta(reader)
}

/// Minimal FASTA parser. Multi-line sequences are joined; the OTU name is the
/// first whitespace-delimited token of the header.
pub fn parse_fasta<R: BufRead>(reader: R) -> Result<Vec<Otu>, FastaError> {
    let mut otus = Vec::new();
    let mut current: Option<Otu> = None;

    for (lineno, line) in reader.lines().enumerate() {
        let line = line?;
        let line = line.trim_end();
        if line.is_empty() {
            continue;
        }

        if let Some(header) = line.strip_prefix('>') {
            if let Some(done) = current.take() {
                otus.push(done);
            }
            let name = header.split_whitespace().next().unwrap_or_default();
            current = Some(Otu::new(name, String::new()));
        } else {
            match current.as_mut() {
                Some(otu) => otu.sequence.push_str(line.trim()),
                None => return Err(FastaError::Orphan(lineno + 1)),
            }
        }
    }
    if let Some(done) = current {
        otus.push(done);
    }

    Ok(otus)
}

/// Formats one FASTA record, sequence on a single line.
pub fn format_fasta_record(header: &str, sequence: &str) -> String {
    format!(">{}\n{}", header, sequence)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_multiline_records() {
        let text = ">otu1 size=10\nACGT\nTTGA\n\n>otu2\nGGG\n";
        let otus = parse_fasta(text.as_bytes()).unwrap();
        assert_eq!(otus.len(), 2);
        assert_eq!(otus[0].name, "otu1");
        assert_eq!(otus[0].sequence, "ACGTTTGA");
        assert_eq!(otus[1].name, "otu2");
        assert_eq!(otus[1].sequence, "GGG");
        assert!(!otus[0].classification.is_classified());
    }

    #[test]
    fn test_orphan_sequence_is_rejected() {
        let err = parse_fasta("ACGT\n>otu1\nA\n".as_bytes()).unwrap_err();
        assert!(matches!(err, FastaError::Orphan(1)));
    }

    #[test]
    fn test_format_record() {
        assert_eq!(format_fasta_record("a;tax=x", "ACGT"), ">a;tax=x\nACGT");
    }
}
