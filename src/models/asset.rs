use crate::error::{EngineError, EngineResult};

/// Check an asset code of the form `CODE` or `CODE/precision` (e.g. `EUR/2`)
pub fn validate_asset(asset: &str) -> EngineResult<()> {
    let (code, precision) = match asset.split_once('/') {
        Some((code, precision)) => (code, Some(precision)),
        None => (asset, None),
    };

    let code_ok = !code.is_empty()
        && code.len() <= 17
        && code.starts_with(|c: char| c.is_ascii_uppercase())
        && code
            .chars()
            .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit() || c == '_');

    let precision_ok = precision.map_or(true, |p| {
        !p.is_empty() && p.len() <= 6 && p.chars().all(|c| c.is_ascii_digit())
    });

    if code_ok && precision_ok {
        Ok(())
    } else {
        Err(EngineError::validation(format!("invalid asset: {asset:?}")))
    }
}
