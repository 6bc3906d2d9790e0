use crate::error::{Error, UnknownCodec};
use flate2::read::{GzDecoder, GzEncoder};
use std::io::Read;

/// Identifies a tile byte-blob's compression (spec §4.2, §6.3). The decoder
/// never consults anything beyond `bytes` plus the caller-supplied
/// dimensions — the dataset schema is the only source of element type.
pub trait TileCodec: Send + Sync {
    fn tag(&self) -> u8;
    fn encode(&self, raw: &[u8]) -> Vec<u8>;
    fn decode(&self, bytes: &[u8]) -> Result<Vec<u8>, Error>;
}

pub struct RawCodec;

impl TileCodec for RawCodec {
    fn tag(&self) -> u8 {
        0
    }

    fn encode(&self, raw: &[u8]) -> Vec<u8> {
        raw.to_vec()
    }

    fn decode(&self, bytes: &[u8]) -> Result<Vec<u8>, Error> {
        Ok(bytes.to_vec())
    }
}

pub struct GzipCodec;

impl TileCodec for GzipCodec {
    fn tag(&self) -> u8 {
        1
    }

    fn encode(&self, raw: &[u8]) -> Vec<u8> {
        let mut out = Vec::new();
        GzEncoder::new(raw, flate2::Compression::default())
            .read_to_end(&mut out)
            .expect("in-memory gzip encode cannot fail");
        out
    }

    fn decode(&self, bytes: &[u8]) -> Result<Vec<u8>, Error> {
        let mut out = Vec::new();
        GzDecoder::new(bytes)
            .read_to_end(&mut out)
            .map_err(|e| Error::Codec {
                width: 0,
                height: 0,
                reason: e.to_string(),
            })?;
        Ok(out)
    }
}

/// Maps compression tags to codec implementations: an explicit registry
/// rather than a class hierarchy.
pub struct CodecRegistry {
    codecs: Vec<Box<dyn TileCodec>>,
}

impl CodecRegistry {
    pub fn new() -> Self {
        Self {
            codecs: vec![Box::new(RawCodec), Box::new(GzipCodec)],
        }
    }

    pub fn get(&self, tag: u8) -> Result<&dyn TileCodec, Error> {
        match self.codecs.iter().map(Box::as_ref).find(|c| c.tag() == tag) {
            Some(codec) => Ok(codec),
            None => UnknownCodec { tag }.fail(),
        }
    }
}

impl Default for CodecRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn raw_round_trips() {
        let registry = CodecRegistry::new();
        let codec = registry.get(0).unwrap();
        let data = vec![1u8, 2, 3, 4, 5];
        assert_eq!(codec.decode(&codec.encode(&data)).unwrap(), data);
    }

    #[test]
    fn gzip_round_trips() {
        let registry = CodecRegistry::new();
        let codec = registry.get(1).unwrap();
        let data: Vec<u8> = (0..4096).map(|i| (i % 7) as u8).collect();
        assert_eq!(codec.decode(&codec.encode(&data)).unwrap(), data);
    }

    #[test]
    fn unknown_tag_errors() {
        let registry = CodecRegistry::new();
        assert!(matches!(registry.get(9), Err(Error::UnknownCodec { tag: 9 })));
    }
}
