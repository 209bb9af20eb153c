//! Codec del payload de un `JobStatus`: JSON, opcionalmente en gzip.

use std::io::{Read, Write};

use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use job_core::{JobStatus, StatusSerializer, StoreError};

#[derive(Debug, Clone, Copy, Default)]
pub struct JsonStatusSerializer;

impl StatusSerializer for JsonStatusSerializer {
    fn write(&self, status: &JobStatus, out: &mut dyn Write, compressed: bool) -> Result<(), StoreError> {
        let encode_err = |e: serde_json::Error| StoreError::backend("failed to encode job status", e);
        if compressed {
            let mut encoder = GzEncoder::new(out, Compression::fast());
            serde_json::to_writer(&mut encoder, status).map_err(encode_err)?;
            encoder.finish()?.flush()?;
        } else {
            serde_json::to_writer(&mut *out, status).map_err(encode_err)?;
            out.flush()?;
        }
        Ok(())
    }

    fn read(&self, input: &mut dyn Read, compressed: bool) -> Result<JobStatus, StoreError> {
        let decoded = if compressed {
            serde_json::from_reader(GzDecoder::new(input))
        } else {
            serde_json::from_reader(input)
        };
        decoded.map_err(|e| StoreError::backend("failed to decode job status", e))
    }
}
