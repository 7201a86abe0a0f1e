use std::collections::HashMap;

use itertools::Itertools;
use serde::Deserialize;
use sha1::{Digest, Sha1};

/// Name of a variation inside a flag's `variations` map.
pub type VariationName = String;

const BUCKET_SCALE: f64 = 0xFFFFFFFFFFFFFFF_u64 as f64;

#[derive(Debug, PartialEq)]
pub(crate) struct BucketResult<'a> {
    pub variation: &'a str,
    pub in_split: bool,
}

// Flag documents are hand-edited, so a rule may name neither a variation nor a percentage
// split. Those deserialize as Malformed instead of failing the whole document, and the flag
// evaluates to an error instead.
#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum VariationOrPercentage {
    Variation { variation: VariationName },
    Percentage { percentage: HashMap<VariationName, f64> },
    Malformed(serde_json::Value),
}

impl VariationOrPercentage {
    /// Picks the variation served to `bucket_by`, the bucketing value of the evaluated context.
    pub(crate) fn variation<'a>(&'a self, flag_key: &str, bucket_by: &str) -> Option<BucketResult<'a>> {
        match self {
            VariationOrPercentage::Variation { variation } => Some(BucketResult {
                variation,
                in_split: false,
            }),
            VariationOrPercentage::Percentage { percentage } => {
                let bucket = bucket(flag_key, bucket_by);
                let mut sum = 0.0;
                // Sort by name so the bucket boundaries do not depend on map iteration order.
                let ordered = percentage.iter().sorted_by_key(|(name, _)| *name).collect_vec();
                for &(name, weight) in &ordered {
                    sum += *weight / 100.0;
                    if bucket < sum {
                        return Some(BucketResult {
                            variation: name.as_str(),
                            in_split: true,
                        });
                    }
                }
                ordered.last().map(|&(name, _)| BucketResult {
                    variation: name.as_str(),
                    in_split: true,
                })
            }
            VariationOrPercentage::Malformed(_) => None,
        }
    }
}

/// Maps a context key onto [0, 1) for a given flag, using the first 15 hex digits of the SHA-1
/// of `"<flag_key>.<context_key>"`.
pub(crate) fn bucket(flag_key: &str, context_key: &str) -> f64 {
    let mut hash = Sha1::new();
    hash.update(flag_key.as_bytes());
    hash.update(b".");
    hash.update(context_key.as_bytes());

    let digest = hash.finalize();
    let hexhash = base16ct::lower::encode_string(&digest);

    // 15 hex digits always fit in an i64
    match i64::from_str_radix(&hexhash[..15], 16) {
        Ok(numhash) => numhash as f64 / BUCKET_SCALE,
        Err(_) => 0.0,
    }
}
