//! Fortran sequential unformatted file reader
//!
//! The solver writes its box probe extracts as Fortran sequential
//! unformatted files: each record is framed by a leading and a trailing
//! 4-byte record marker holding the payload length in bytes, everything
//! little-endian.

use byteorder::{LittleEndian, ReadBytesExt};
use std::{
    fs::File,
    io::{BufReader, ErrorKind, Read},
    path::Path,
};

#[derive(Debug, thiserror::Error)]
pub enum FortranError {
    #[error("Failed to read the unformatted file")]
    Io(#[from] std::io::Error),
    #[error("Record markers disagree: {lead} at the head, {trail} at the tail")]
    MarkerMismatch { lead: u32, trail: u32 },
    #[error("Record of {len} bytes is not a multiple of the {item} bytes item size")]
    Misaligned { len: usize, item: usize },
}
type Result<T> = std::result::Result<T, FortranError>;

/// A reader over a stream of Fortran unformatted records
pub struct FortranFile {
    reader: BufReader<File>,
}
impl FortranFile {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Ok(Self {
            reader: BufReader::new(File::open(path)?),
        })
    }
    /// Returns the next record payload or `None` at the end of the file
    pub fn read_record_bytes(&mut self) -> Result<Option<Vec<u8>>> {
        let lead = match self.reader.read_u32::<LittleEndian>() {
            Ok(value) => value,
            Err(e) if e.kind() == ErrorKind::UnexpectedEof => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let mut payload = vec![0u8; lead as usize];
        self.reader.read_exact(&mut payload)?;
        let trail = self.reader.read_u32::<LittleEndian>()?;
        if lead != trail {
            return Err(FortranError::MarkerMismatch { lead, trail });
        }
        Ok(Some(payload))
    }
    /// Decodes the next record as a vector of `i32`
    pub fn read_i32_record(&mut self) -> Result<Option<Vec<i32>>> {
        match self.read_record_bytes()? {
            None => Ok(None),
            Some(payload) => {
                if payload.len() % 4 != 0 {
                    return Err(FortranError::Misaligned {
                        len: payload.len(),
                        item: 4,
                    });
                }
                Ok(Some(
                    payload
                        .chunks_exact(4)
                        .map(|b| i32::from_le_bytes([b[0], b[1], b[2], b[3]]))
                        .collect(),
                ))
            }
        }
    }
    /// Decodes the next record as a vector of `f64`
    pub fn read_f64_record(&mut self) -> Result<Option<Vec<f64>>> {
        match self.read_record_bytes()? {
            None => Ok(None),
            Some(payload) => {
                if payload.len() % 8 != 0 {
                    return Err(FortranError::Misaligned {
                        len: payload.len(),
                        item: 8,
                    });
                }
                Ok(Some(
                    payload
                        .chunks_exact(8)
                        .map(|b| {
                            f64::from_le_bytes([b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7]])
                        })
                        .collect(),
                ))
            }
        }
    }
    /// Concatenates every remaining `f64` record
    ///
    /// Fields may be written as a single large record or split in chunks.
    pub fn read_f64_all(&mut self) -> Result<Vec<f64>> {
        let mut data = vec![];
        while let Some(record) = self.read_f64_record()? {
            data.extend(record);
        }
        Ok(data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use byteorder::{LittleEndian, WriteBytesExt};
    use std::io::Write;
    use tempdir::TempDir;

    fn write_record(file: &mut std::fs::File, payload: &[u8]) {
        file.write_u32::<LittleEndian>(payload.len() as u32).unwrap();
        file.write_all(payload).unwrap();
        file.write_u32::<LittleEndian>(payload.len() as u32).unwrap();
    }

    #[test]
    fn int_records() {
        let tmp = TempDir::new("fortran").unwrap();
        let path = tmp.path().join("mapping.dat");
        let mut file = std::fs::File::create(&path).unwrap();
        for n in 0..3i32 {
            let mut payload = vec![];
            for value in [n, n + 1, n + 2, n + 3] {
                payload.write_i32::<LittleEndian>(value).unwrap();
            }
            write_record(&mut file, &payload);
        }
        drop(file);
        let mut fortran = FortranFile::open(&path).unwrap();
        assert_eq!(fortran.read_i32_record().unwrap().unwrap(), vec![0, 1, 2, 3]);
        assert_eq!(fortran.read_i32_record().unwrap().unwrap(), vec![1, 2, 3, 4]);
        assert_eq!(fortran.read_i32_record().unwrap().unwrap(), vec![2, 3, 4, 5]);
        assert!(fortran.read_i32_record().unwrap().is_none());
    }

    #[test]
    fn float_records_concatenated() {
        let tmp = TempDir::new("fortran").unwrap();
        let path = tmp.path().join("T.dat");
        let mut file = std::fs::File::create(&path).unwrap();
        for chunk in [vec![1f64, 2., 3.], vec![4f64, 5.]] {
            let mut payload = vec![];
            for value in chunk {
                payload.write_f64::<LittleEndian>(value).unwrap();
            }
            write_record(&mut file, &payload);
        }
        drop(file);
        let mut fortran = FortranFile::open(&path).unwrap();
        assert_eq!(fortran.read_f64_all().unwrap(), vec![1., 2., 3., 4., 5.]);
    }

    #[test]
    fn marker_mismatch() {
        let tmp = TempDir::new("fortran").unwrap();
        let path = tmp.path().join("bad.dat");
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_u32::<LittleEndian>(8).unwrap();
        file.write_f64::<LittleEndian>(1.).unwrap();
        file.write_u32::<LittleEndian>(12).unwrap();
        drop(file);
        let mut fortran = FortranFile::open(&path).unwrap();
        assert!(matches!(
            fortran.read_f64_record(),
            Err(FortranError::MarkerMismatch { lead: 8, trail: 12 })
        ));
    }
}
