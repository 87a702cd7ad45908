//! Wallet signature verification (EIP-191 personal messages, secp256k1).

use alloy_primitives::Signature;

/// Length of an uncompressed `r || s || v` signature.
const SIGNATURE_LEN: usize = 65;

/// Length of an EVM address in bytes.
const ADDRESS_LEN: usize = 20;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum SignatureError {
    #[error("Invalid signature encoding: {0}")]
    Malformed(String),

    #[error("Signature recovery failed: {0}")]
    Recovery(String),
}

/// Normalize a wallet address to its canonical form: `0x` followed by 40
/// lower-case hex digits.
///
/// Returns `None` if the input is not a 20-byte hex address. Checksums are not
/// enforced; comparison between addresses is case-insensitive.
pub fn canonical_address(input: &str) -> Option<String> {
    let trimmed = input.trim();
    let digits = trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))?;

    if digits.len() != ADDRESS_LEN * 2 || !digits.chars().all(|c| c.is_ascii_hexdigit()) {
        return None;
    }

    Some(format!("0x{}", digits.to_ascii_lowercase()))
}

/// Recover the address that produced `signature_hex` over `message`.
///
/// The message is hashed with the Ethereum personal-message prefix
/// (`"\x19Ethereum Signed Message:\n" + len`), which is what wallets apply for
/// `personal_sign`. The result is returned in canonical lower-case form.
///
/// # Arguments
/// * `message` - The exact text the wallet was asked to sign
/// * `signature_hex` - Hex-encoded 65-byte signature, with or without `0x`
pub fn recover_signer(message: &str, signature_hex: &str) -> Result<String, SignatureError> {
    let trimmed = signature_hex.trim();
    let digits = trimmed.strip_prefix("0x").unwrap_or(trimmed);

    let bytes = hex::decode(digits)
        .map_err(|e| SignatureError::Malformed(format!("invalid hex: {}", e)))?;

    if bytes.len() != SIGNATURE_LEN {
        return Err(SignatureError::Malformed(format!(
            "expected {} bytes, got {}",
            SIGNATURE_LEN,
            bytes.len()
        )));
    }

    let signature = Signature::try_from(bytes.as_slice())
        .map_err(|e| SignatureError::Malformed(e.to_string()))?;

    let address = signature
        .recover_address_from_msg(message.as_bytes())
        .map_err(|e| SignatureError::Recovery(e.to_string()))?;

    Ok(format!("0x{}", hex::encode(address.as_slice())))
}

/// Check that `signature_hex` over `message` was produced by `claimed_address`.
///
/// # Returns
/// * `Ok(true)` if the recovered signer equals the claimed address
/// * `Ok(false)` if the signature is well-formed but from another key
/// * `Err(SignatureError)` if the signature cannot be decoded or recovered
pub fn verify_wallet_signature(
    claimed_address: &str,
    message: &str,
    signature_hex: &str,
) -> Result<bool, SignatureError> {
    let recovered = recover_signer(message, signature_hex)?;
    Ok(canonical_address(claimed_address).is_some_and(|claimed| claimed == recovered))
}
