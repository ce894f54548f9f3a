use hoosat_sdk::wallet::{
    hash, pay_to_address_script, verify_input, AddressVersion, BuilderState, Decode, Encode,
    ExtendedKey, KeyPair, Network, Outpoint, Transaction, TransactionBuilder, UtxoEntry,
    UtxoEntryReference,
};
use hoosat_sdk::{build_payment_uri, parse_payment_uri, units, Address, HoosatError, PaymentParams};

fn funding_utxo(keypair: &KeyPair, address_type: AddressVersion, amount: u64) -> UtxoEntryReference {
    let address = keypair.address(address_type);
    UtxoEntryReference {
        outpoint: Outpoint::new(hash(b"funding transaction"), 0),
        entry: UtxoEntry::new(amount, pay_to_address_script(&address), 1_000, false),
        address: Some(address),
    }
}

#[test]
fn test_build_sign_and_identify() {
    let sender = KeyPair::generate(Network::Mainnet);
    let recipient = KeyPair::generate(Network::Mainnet).address(AddressVersion::PubKeyEcdsa);
    let change = sender.address(AddressVersion::PubKeyEcdsa);

    let mut builder = TransactionBuilder::new(Network::Mainnet);
    assert_eq!(builder.state(), BuilderState::Empty);
    builder
        .add_input(funding_utxo(&sender, AddressVersion::PubKeyEcdsa, 100_000_000), &sender)
        .unwrap()
        .add_output(&recipient.to_string(), 60_000_000)
        .unwrap()
        .add_output(&change.to_string(), 39_999_000)
        .unwrap();
    assert_eq!(builder.fee(), 1_000);

    let signed = builder.sign().unwrap();
    assert_eq!(builder.state(), BuilderState::Signed);
    assert_eq!(signed.id, signed.transaction.id());
    assert_eq!(signed.transaction.id(), signed.transaction.id());

    let entries = vec![funding_utxo(&sender, AddressVersion::PubKeyEcdsa, 100_000_000).entry];
    assert!(verify_input(&signed.transaction, &entries, 0).unwrap());

    let decoded = Transaction::decode(&signed.to_bytes()).unwrap();
    assert_eq!(decoded, signed.transaction);
    assert_eq!(decoded.id(), signed.id);

    for output in 0..signed.transaction.outputs.len() {
        let mut tampered = signed.transaction.clone();
        tampered.outputs[output].script_public_key.script[1] ^= 0x01;
        assert_ne!(tampered.id(), signed.id);
        assert_ne!(tampered.encode(), signed.to_bytes());
    }

    assert!(matches!(
        builder.add_output(&recipient.to_string(), 1),
        Err(HoosatError::AlreadySigned)
    ));
}

#[test]
fn test_wrong_key_never_signs() {
    let owner = KeyPair::generate(Network::Mainnet);
    let intruder = KeyPair::generate(Network::Mainnet);
    let mut builder = TransactionBuilder::new(Network::Mainnet);
    let result = builder.add_input(funding_utxo(&owner, AddressVersion::PubKeyHash, 5_000), &intruder);
    assert!(matches!(result, Err(HoosatError::SigningKeyMismatch(0))));
    assert!(builder.transaction().inputs.is_empty());
}

#[test]
fn test_same_key_two_networks() {
    let mainnet = KeyPair::generate(Network::Mainnet);
    let testnet = mainnet.with_network(Network::Testnet);

    for address_type in [
        AddressVersion::PubKey,
        AddressVersion::PubKeyEcdsa,
        AddressVersion::PubKeyHash,
    ] {
        let a = mainnet.address(address_type);
        let b = testnet.address(address_type);
        assert_ne!(a.to_string(), b.to_string());
        assert_eq!(a.payload, b.payload);
        assert!(Address::is_valid(&a.to_string()));
        assert!(Address::is_valid(&b.to_string()));
    }
}

#[test]
fn test_hd_key_pays_to_payment_uri() {
    let master = ExtendedKey::from_seed(&[42u8; 32], Network::Mainnet).unwrap();
    let payer = master.derive_receive_key(0).unwrap();
    let payee = master.derive_receive_key(1).unwrap();
    let payee_address = payee.keypair().address(AddressVersion::PubKey);

    let uri = build_payment_uri(
        &PaymentParams::new(payee_address.clone())
            .with_amount(units::htn_to_sompi("0.5").unwrap())
            .with_label("Invoice 7"),
    );
    let request = parse_payment_uri(&uri).unwrap();
    let amount = request.amount.unwrap();
    assert_eq!(amount, 50_000_000);

    let mut builder = TransactionBuilder::new(Network::Mainnet);
    builder
        .add_input(
            funding_utxo(payer.keypair(), AddressVersion::PubKey, 60_000_000),
            payer.keypair(),
        )
        .unwrap()
        .add_output(&request.address.to_string(), amount)
        .unwrap();
    let signed = builder.sign().unwrap();

    assert_eq!(
        signed.transaction.outputs[0].script_public_key,
        pay_to_address_script(&payee_address)
    );
    let entries = vec![funding_utxo(payer.keypair(), AddressVersion::PubKey, 60_000_000).entry];
    assert!(verify_input(&signed.transaction, &entries, 0).unwrap());
}
