//! Object address grammar
//!
//! - `zs://<prefix>/<file_name>` — erasure-coded object address; the
//!   engine consumes only the part after the scheme.
//! - `s3://<bucket>/<key>` and `gs://<bucket>/<key>` — raw passthrough
//!   addresses.

use anyhow::{bail, Result};

/// Strip the `zs://` scheme and return the logical object key.
pub fn parse_zs_url(url: &str) -> Result<String> {
    match url.strip_prefix("zs://") {
        Some(key) => Ok(key.to_string()),
        None => bail!("URL must start with zs://"),
    }
}

/// Split an `s3://bucket/key` URL into bucket and key. The key may be
/// empty when only a bucket is given.
pub fn parse_s3_url(url: &str) -> Result<(String, String)> {
    let Some(path) = url.strip_prefix("s3://") else {
        bail!("URL must start with s3://");
    };
    Ok(split_bucket_key(path))
}

/// Split a `gs://bucket/key` URL into bucket and key.
pub fn parse_gs_url(url: &str) -> Result<(String, String)> {
    let Some(path) = url.strip_prefix("gs://") else {
        bail!("URL must start with gs://");
    };
    Ok(split_bucket_key(path))
}

fn split_bucket_key(path: &str) -> (String, String) {
    match path.split_once('/') {
        Some((bucket, key)) => (bucket.to_string(), key.to_string()),
        None => (path.to_string(), String::new()),
    }
}
