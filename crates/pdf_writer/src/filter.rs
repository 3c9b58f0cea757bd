//! Stream filters applied to stream data before it is written

use crate::Result;
use flate2::write::ZlibEncoder;
use flate2::Compression;
use std::io::Write;

/// One encoding step of a stream's `/Filter` chain
pub trait StreamFilter {
    /// Filter name as it appears in the stream dictionary
    fn name(&self) -> &'static str;

    fn encode(&self, data: &[u8]) -> Result<Vec<u8>>;
}

/// zlib/deflate compression (`/FlateDecode`)
#[derive(Debug, Clone, Copy)]
pub struct FlateFilter {
    level: Compression,
}

impl FlateFilter {
    pub fn new(level: u32) -> Self {
        Self {
            level: Compression::new(level.min(9)),
        }
    }
}

impl Default for FlateFilter {
    fn default() -> Self {
        Self {
            level: Compression::default(),
        }
    }
}

impl StreamFilter for FlateFilter {
    fn name(&self) -> &'static str {
        "FlateDecode"
    }

    fn encode(&self, data: &[u8]) -> Result<Vec<u8>> {
        let mut encoder = ZlibEncoder::new(Vec::new(), self.level);
        encoder.write_all(data)?;
        Ok(encoder.finish()?)
    }
}

/// Ordered filters; data passes through them first to last, and the
/// `/Filter` entry lists them last to first so readers decode in order.
#[derive(Default)]
pub struct FilterPipeline {
    filters: Vec<Box<dyn StreamFilter>>,
}

impl std::fmt::Debug for FilterPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.filters.iter().map(|x| x.name())).finish()
    }
}

impl FilterPipeline {
    pub fn new() -> Self {
        Self::default()
    }

    /// The pipeline used for compressed output
    pub fn flate() -> Self {
        Self::new().with(FlateFilter::default())
    }

    pub fn with(mut self, filter: impl StreamFilter + 'static) -> Self {
        self.filters.push(Box::new(filter));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.filters.is_empty()
    }

    pub fn encode(&self, data: &[u8]) -> Result<Vec<u8>> {
        let mut current = data.to_vec();
        for filter in &self.filters {
            current = filter.encode(&current)?;
        }
        Ok(current)
    }

    /// Names for the `/Filter` entry, decode order
    pub fn names(&self) -> Vec<&'static str> {
        self.filters.iter().rev().map(|f| f.name()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::read::ZlibDecoder;
    use std::io::Read;

    #[test]
    fn test_flate_round_trip() {
        let data = b"BT /F1 12 Tf (Hello) Tj ET ".repeat(20);
        let encoded = FilterPipeline::flate().encode(&data).unwrap();
        assert!(encoded.len() < data.len());

        let mut decoded = Vec::new();
        ZlibDecoder::new(&encoded[..]).read_to_end(&mut decoded).unwrap();
        assert_eq!(decoded, data);
    }

    #[test]
    fn test_empty_pipeline_passes_through() {
        let pipeline = FilterPipeline::new();
        assert!(pipeline.is_empty());
        assert_eq!(pipeline.encode(b"abc").unwrap(), b"abc");
        assert!(pipeline.names().is_empty());
    }
}
