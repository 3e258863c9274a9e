//! Deterministic secret derivation and premint bookkeeping.
//!
//! Proof secrets and blinding factors are derived from the wallet seed with
//! HMAC-SHA256 over the keyset id and a monotonic per-keyset counter, so a
//! wallet restored from its mnemonic derives the same secrets in the same
//! order. The blind-signature curve math itself lives behind the mint
//! connector seam; blinded secrets and signatures are carried as opaque hex.

use bip39::Mnemonic;
use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};

use pocket_types::{Amount, CurrencyUnit, Keyset, KeysetId, Proof, SpendingConditions};

use crate::error::WalletError;
use crate::mint_client::{BlindSignature, BlindedMessage};

type HmacSha256 = Hmac<Sha256>;

/// Generate a fresh 12-word BIP-39 mnemonic.
pub fn generate_mnemonic() -> Result<String, WalletError> {
    let mnemonic = Mnemonic::generate(12)
        .map_err(|e| WalletError::KeyDerivation(format!("mnemonic generation failed: {e}")))?;
    Ok(mnemonic.to_string())
}

/// Derives proof secrets and blinding factors from the wallet seed.
pub(crate) struct SecretDeriver {
    seed: [u8; 64],
}

impl SecretDeriver {
    pub fn from_mnemonic(phrase: &str) -> Result<Self, WalletError> {
        let mnemonic = Mnemonic::parse(phrase)
            .map_err(|e| WalletError::KeyDerivation(format!("invalid mnemonic: {e}")))?;
        Ok(Self {
            seed: mnemonic.to_seed(""),
        })
    }

    fn derive(&self, domain: &[u8], keyset_id: &KeysetId, counter: u32) -> String {
        let mut mac = HmacSha256::new_from_slice(&self.seed).expect("hmac accepts any key length");
        mac.update(domain);
        mac.update(keyset_id.as_str().as_bytes());
        mac.update(&counter.to_be_bytes());
        hex::encode(mac.finalize().into_bytes())
    }

    pub fn secret(&self, keyset_id: &KeysetId, counter: u32) -> String {
        self.derive(b"pocket/secret", keyset_id, counter)
    }

    pub fn blinding_factor(&self, keyset_id: &KeysetId, counter: u32) -> String {
        self.derive(b"pocket/blind", keyset_id, counter)
    }
}

/// One output prepared for the mint: the secret stays local, the blinded
/// form goes over the wire.
pub(crate) struct PreMint {
    pub amount: Amount,
    pub secret: String,
    pub blinded: BlindedMessage,
}

/// A batch of premints for one request to the mint.
pub(crate) struct PreMintBatch {
    premints: Vec<PreMint>,
    keyset_id: KeysetId,
}

impl PreMintBatch {
    /// Prepare outputs for `amounts`, consuming derivation indices starting
    /// at `counter_start`.
    pub fn new(
        deriver: &SecretDeriver,
        keyset_id: &KeysetId,
        counter_start: u32,
        amounts: &[Amount],
    ) -> Self {
        let premints = amounts
            .iter()
            .enumerate()
            .map(|(i, &amount)| {
                let counter = counter_start.wrapping_add(i as u32);
                let secret = deriver.secret(keyset_id, counter);
                let factor = deriver.blinding_factor(keyset_id, counter);
                let mut hasher = Sha256::new();
                hasher.update(secret.as_bytes());
                hasher.update(factor.as_bytes());
                let blinded_secret = format!("02{}", hex::encode(hasher.finalize()));
                PreMint {
                    amount,
                    secret,
                    blinded: BlindedMessage {
                        amount,
                        keyset_id: keyset_id.clone(),
                        blinded_secret,
                    },
                }
            })
            .collect();
        Self {
            premints,
            keyset_id: keyset_id.clone(),
        }
    }

    pub fn len(&self) -> usize {
        self.premints.len()
    }

    pub fn total(&self) -> Result<Amount, WalletError> {
        Ok(Amount::try_sum(self.premints.iter().map(|p| p.amount))?)
    }

    pub fn blinded_messages(&self) -> Vec<BlindedMessage> {
        self.premints.iter().map(|p| p.blinded.clone()).collect()
    }

    /// Combine the mint's signatures with the local secrets into proofs.
    ///
    /// Verifies the response against the keyset: one signature per output,
    /// matching amount and keyset id, and a denomination the keyset can
    /// actually sign. Fails with [`WalletError::SignatureVerification`]
    /// otherwise; an unknown keyset id is [`WalletError::KeysetInactive`].
    pub fn unblind(
        self,
        signatures: Vec<BlindSignature>,
        keyset: &Keyset,
        unit: &CurrencyUnit,
        conditions: Option<&SpendingConditions>,
    ) -> Result<Vec<Proof>, WalletError> {
        if signatures.len() != self.premints.len() {
            return Err(WalletError::SignatureVerification(format!(
                "expected {} signatures, got {}",
                self.premints.len(),
                signatures.len()
            )));
        }
        self.premints
            .into_iter()
            .zip(signatures)
            .map(|(premint, sig)| {
                if sig.keyset_id != self.keyset_id {
                    return Err(WalletError::KeysetInactive(sig.keyset_id.to_string()));
                }
                if sig.amount != premint.amount {
                    return Err(WalletError::SignatureVerification(format!(
                        "signature amount {} does not match output {}",
                        sig.amount, premint.amount
                    )));
                }
                if !keyset.supports(sig.amount) {
                    return Err(WalletError::SignatureVerification(format!(
                        "keyset {} has no key for denomination {}",
                        self.keyset_id, sig.amount
                    )));
                }
                Ok(Proof {
                    amount: premint.amount,
                    unit: unit.clone(),
                    keyset_id: self.keyset_id.clone(),
                    secret: premint.secret,
                    signature: sig.signature,
                    conditions: conditions.cloned(),
                    witness: None,
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn keyset() -> Keyset {
        Keyset {
            id: KeysetId::new("00test"),
            unit: CurrencyUnit::Sat,
            keys: (0..16).map(|i| (1u64 << i, format!("02k{i}"))).collect::<BTreeMap<_, _>>(),
            active: true,
            input_fee_ppk: 0,
        }
    }

    fn deriver() -> SecretDeriver {
        let phrase = generate_mnemonic().unwrap();
        SecretDeriver::from_mnemonic(&phrase).unwrap()
    }

    fn signatures_for(batch: &PreMintBatch) -> Vec<BlindSignature> {
        batch
            .blinded_messages()
            .into_iter()
            .map(|b| BlindSignature {
                amount: b.amount,
                keyset_id: b.keyset_id,
                signature: format!("02sig{}", &b.blinded_secret[2..10]),
            })
            .collect()
    }

    #[test]
    fn test_mnemonic_generation_is_random() {
        let a = generate_mnemonic().unwrap();
        let b = generate_mnemonic().unwrap();
        assert!(a.split_whitespace().count() >= 12);
        assert_ne!(a, b);
    }

    #[test]
    fn test_derivation_is_deterministic() {
        let phrase = generate_mnemonic().unwrap();
        let d1 = SecretDeriver::from_mnemonic(&phrase).unwrap();
        let d2 = SecretDeriver::from_mnemonic(&phrase).unwrap();
        let id = KeysetId::new("00test");
        assert_eq!(d1.secret(&id, 5), d2.secret(&id, 5));
        assert_ne!(d1.secret(&id, 5), d1.secret(&id, 6));
        assert_ne!(d1.secret(&id, 5), d1.blinding_factor(&id, 5));
    }

    #[test]
    fn test_unblind_produces_proofs() {
        let ks = keyset();
        let amounts = [Amount::new(2), Amount::new(8)];
        let batch = PreMintBatch::new(&deriver(), &ks.id, 0, &amounts);
        let sigs = signatures_for(&batch);
        let proofs = batch.unblind(sigs, &ks, &CurrencyUnit::Sat, None).unwrap();
        assert_eq!(proofs.len(), 2);
        assert_eq!(
            Amount::try_sum(proofs.iter().map(|p| p.amount)).unwrap(),
            Amount::new(10)
        );
        assert_ne!(proofs[0].secret, proofs[1].secret);
    }

    #[test]
    fn test_unblind_rejects_count_mismatch() {
        let ks = keyset();
        let batch = PreMintBatch::new(&deriver(), &ks.id, 0, &[Amount::new(4)]);
        let err = batch
            .unblind(vec![], &ks, &CurrencyUnit::Sat, None)
            .unwrap_err();
        assert!(matches!(err, WalletError::SignatureVerification(_)));
    }

    #[test]
    fn test_unblind_rejects_unsupported_denomination() {
        let ks = keyset();
        // 5 is not a power of two; the keyset has no key for it.
        let batch = PreMintBatch::new(&deriver(), &ks.id, 0, &[Amount::new(5)]);
        let sigs = signatures_for(&batch);
        let err = batch
            .unblind(sigs, &ks, &CurrencyUnit::Sat, None)
            .unwrap_err();
        assert!(
            matches!(err, WalletError::SignatureVerification(ref msg) if msg.contains("denomination"))
        );
    }

    #[test]
    fn test_unblind_rejects_foreign_keyset() {
        let ks = keyset();
        let batch = PreMintBatch::new(&deriver(), &ks.id, 0, &[Amount::new(4)]);
        let sigs = vec![BlindSignature {
            amount: Amount::new(4),
            keyset_id: KeysetId::new("00other"),
            signature: "02x".into(),
        }];
        let err = batch
            .unblind(sigs, &ks, &CurrencyUnit::Sat, None)
            .unwrap_err();
        assert!(matches!(err, WalletError::KeysetInactive(_)));
    }
}
