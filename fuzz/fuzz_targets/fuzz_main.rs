// SPDX-License-Identifier: AGPL-3.0-or-later
#![no_main]
use libfuzzer_sys::fuzz_target;
use reportrix_core::{
    AssetStore, Block, Document, EncoderRegistry, LeafBuilder, LeafTag, ValidationMode, Validator,
    XmlBuilder,
};

// Arbitrary names and text must either be rejected at construction or
// produce markup that validates and serializes.
fuzz_target!(|data: &[u8]| {
    let Ok(input) = std::str::from_utf8(data) else {
        return;
    };
    let (name, body) = input.split_once('\n').unwrap_or((input, input));

    let mut blocks = vec![Block::text(body), Block::code(body, "text")];
    if let Ok(named) = LeafBuilder::new(LeafTag::Text).name(name).content(body).build() {
        blocks.push(Block::group(vec![named]));
    }

    let mut document = Document::new(blocks);
    let mut store = AssetStore::discard();
    let encoders = EncoderRegistry::with_defaults();
    let root = XmlBuilder::new(&mut store, &encoders)
        .build(&mut document)
        .expect("text-only documents always convert");
    let valid = Validator::new()
        .validate(&root, ValidationMode::Quiet)
        .expect("quiet validation never errors");
    assert!(valid, "generated markup failed validation");
    let _ = root.to_xml(true);
});
