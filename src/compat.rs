//! Version-agnostic access to `VersionedMessage` internals and manual signing
//!
//! Legacy and V0 messages expose their header and static keys through different
//! fields; the helpers here give one API for both.

use solana_sdk::{
    message::{MessageHeader, VersionedMessage},
    pubkey::Pubkey,
    signature::{Keypair, Signature, Signer},
    transaction::VersionedTransaction,
};

#[inline]
#[must_use]
pub fn get_message_header(message: &VersionedMessage) -> &MessageHeader {
    match message {
        VersionedMessage::Legacy(legacy_msg) => &legacy_msg.header,
        VersionedMessage::V0(v0_msg) => &v0_msg.header,
    }
}

/// Keys embedded in the message itself, excluding lookup-table addresses
#[inline]
#[must_use]
pub fn get_static_account_keys(message: &VersionedMessage) -> &[Pubkey] {
    match message {
        VersionedMessage::Legacy(legacy_msg) => &legacy_msg.account_keys,
        VersionedMessage::V0(v0_msg) => &v0_msg.account_keys,
    }
}

/// The accounts that must sign, in signature order.
///
/// Required signers are always the first `num_required_signatures` static keys.
#[inline]
#[must_use]
pub fn get_required_signers(message: &VersionedMessage) -> &[Pubkey] {
    let header = get_message_header(message);
    let account_keys = get_static_account_keys(message);
    let num_signers = header.num_required_signatures as usize;

    &account_keys[..num_signers.min(account_keys.len())]
}

/// Sign `message` with the matching keypairs, one signature per required signer.
///
/// `VersionedTransaction::try_new` insists on an exact signer set; callers here may hand
/// over extra keypairs, so signatures are produced manually. Returns the first required
/// signer that has no keypair.
pub fn sign_versioned_message<K>(
    message: VersionedMessage,
    keypairs: &[K],
) -> Result<VersionedTransaction, Pubkey>
where
    K: AsRef<Keypair>,
{
    let message_bytes = message.serialize();
    let signatures = get_required_signers(&message)
        .iter()
        .map(|required| {
            keypairs
                .iter()
                .map(AsRef::as_ref)
                .find(|kp| kp.pubkey() == *required)
                .map(|kp| kp.sign_message(&message_bytes))
                .ok_or(*required)
        })
        .collect::<Result<Vec<Signature>, Pubkey>>()?;

    Ok(VersionedTransaction {
        signatures,
        message,
    })
}

/// The fee payer's signature, which identifies the transaction on the ledger
#[inline]
pub fn first_signature(tx: &VersionedTransaction) -> Option<Signature> {
    tx.signatures.first().copied()
}

#[cfg(test)]
mod tests {
    use super::*;
    use solana_sdk::{
        hash::Hash,
        instruction::{AccountMeta, Instruction},
        message::{v0::Message as MessageV0, Message},
    };
    #[allow(deprecated)]
    use solana_sdk::system_instruction;
    use std::sync::Arc;

    #[test]
    fn test_legacy_and_v0_agree() {
        let payer = Keypair::new();
        let recipient = Pubkey::new_unique();
        let instruction = system_instruction::transfer(&payer.pubkey(), &recipient, 1000);

        let legacy = VersionedMessage::Legacy(Message::new(
            &[instruction.clone()],
            Some(&payer.pubkey()),
        ));
        let v0 = VersionedMessage::V0(
            MessageV0::try_compile(&payer.pubkey(), &[instruction], &[], Hash::default()).unwrap(),
        );

        for message in [&legacy, &v0] {
            assert_eq!(get_message_header(message).num_required_signatures, 1);
            assert_eq!(get_static_account_keys(message)[0], payer.pubkey());
            assert_eq!(get_required_signers(message), &[payer.pubkey()]);
        }
    }

    #[test]
    fn test_sign_with_cosigner() {
        let payer = Arc::new(Keypair::new());
        let mint = Arc::new(Keypair::new());
        let unrelated = Arc::new(Keypair::new());
        let instruction = Instruction::new_with_bytes(
            Pubkey::new_unique(),
            &[0],
            vec![AccountMeta::new(mint.pubkey(), true)],
        );
        let message = VersionedMessage::V0(
            MessageV0::try_compile(&payer.pubkey(), &[instruction], &[], Hash::new_unique())
                .unwrap(),
        );

        let tx = sign_versioned_message(
            message.clone(),
            &[unrelated, mint.clone(), payer.clone()],
        )
        .unwrap();
        assert_eq!(tx.signatures.len(), 2);
        assert!(tx.verify_with_results().iter().all(|ok| *ok));
        assert_eq!(first_signature(&tx), Some(tx.signatures[0]));

        let missing = sign_versioned_message(message, &[payer]).unwrap_err();
        assert_eq!(missing, mint.pubkey());
    }
}
