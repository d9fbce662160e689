// Copyright 2026 Adobe. All rights reserved.
// This file is licensed to you under the Apache License,
// Version 2.0 (http://www.apache.org/licenses/LICENSE-2.0)
// or the MIT license (http://opensource.org/licenses/MIT),
// at your option.

// Unless required by applicable law or agreed to in writing,
// this software is distributed on an "AS IS" BASIS, WITHOUT
// WARRANTIES OR REPRESENTATIONS OF ANY KIND, either express or
// implied. See the LICENSE-MIT and LICENSE-APACHE files for the
// specific language governing permissions and limitations under
// each license.

// Value sharing (tags 28/29) and cycle detection.
//
// Share indexes are the depth of the container stack when a container is
// first seen, so siblings at the same depth get the same index.

use cbor_encoder::{CborError, Encoder, EncoderOptions, Value, encode_to_vec};
use hex_literal::hex;

fn sharing() -> EncoderOptions {
    EncoderOptions::default().with_value_sharing(true)
}

fn no_sharing() -> EncoderOptions {
    EncoderOptions::default()
}

fn push(list: &Value, item: Value) {
    list.as_array().unwrap().borrow_mut().push(item);
}

#[test]
fn test_repeated_container_becomes_reference() {
    let a = Value::array([Value::from(1)]);
    let root = Value::array([a.clone(), a]);

    assert_eq!(
        encode_to_vec(&root, &sharing()).unwrap(),
        hex!("d81c 82 d81c 81 01 d81d 01")
    );
    // Without sharing the body is simply written twice
    assert_eq!(
        encode_to_vec(&root, &no_sharing()).unwrap(),
        hex!("82 81 01 81 01")
    );
}

#[test]
fn test_share_index_is_stack_depth() {
    let b = Value::array([Value::from(2)]);
    let inner = Value::array([b.clone()]);
    let root = Value::array([inner, b]);

    // root -> 0, inner -> 1, b (inside inner) -> 2
    assert_eq!(
        encode_to_vec(&root, &sharing()).unwrap(),
        hex!("d81c 82 d81c 81 d81c 81 02 d81d 02")
    );
}

#[test]
fn test_siblings_share_the_same_index() {
    let x = Value::array([Value::from(1)]);
    let y = Value::array([Value::from(2)]);
    let root = Value::array([x.clone(), y, x]);

    assert_eq!(
        encode_to_vec(&root, &sharing()).unwrap(),
        hex!("d81c 83 d81c 81 01 d81c 81 02 d81d 01")
    );
}

#[test]
fn test_self_referencing_array() {
    let root = Value::array([]);
    push(&root, root.clone());

    assert_eq!(
        encode_to_vec(&root, &sharing()).unwrap(),
        hex!("d81c 81 d81d 00")
    );
    assert!(matches!(
        encode_to_vec(&root, &no_sharing()),
        Err(CborError::CyclicStructure)
    ));
}

#[test]
fn test_self_referencing_map() {
    let root = Value::map([]);
    let alias = root.clone();
    root.as_map()
        .unwrap()
        .borrow_mut()
        .push((Value::from("a"), alias));

    assert_eq!(
        encode_to_vec(&root, &sharing()).unwrap(),
        hex!("d81c a1 6161 d81d 00")
    );
    assert!(matches!(
        encode_to_vec(&root, &no_sharing()),
        Err(CborError::CyclicStructure)
    ));
}

#[test]
fn test_indirect_cycle() {
    let a = Value::array([]);
    let b = Value::array([a.clone()]);
    push(&a, b);

    assert_eq!(
        encode_to_vec(&a, &sharing()).unwrap(),
        hex!("d81c 81 d81c 81 d81d 00")
    );
    assert!(matches!(
        encode_to_vec(&a, &no_sharing()),
        Err(CborError::CyclicStructure)
    ));
}

#[test]
fn test_empty_containers_are_never_marked() {
    for options in [sharing(), no_sharing()] {
        assert_eq!(encode_to_vec(&Value::array([]), &options).unwrap(), hex!("80"));
        assert_eq!(encode_to_vec(&Value::map([]), &options).unwrap(), hex!("a0"));
    }

    let empty = Value::array([]);
    let root = Value::array([empty.clone(), empty]);
    assert_eq!(
        encode_to_vec(&root, &sharing()).unwrap(),
        hex!("d81c 82 80 80")
    );
}

#[test]
fn test_structurally_equal_containers_are_distinct() {
    let root = Value::array([
        Value::array([Value::from(1)]),
        Value::array([Value::from(1)]),
    ]);
    assert_eq!(
        encode_to_vec(&root, &sharing()).unwrap(),
        hex!("d81c 82 d81c 81 01 d81c 81 01")
    );
}

#[test]
fn test_decimal_payload_does_not_take_share_index() {
    let shared = Value::array([Value::from(1)]);
    let decimal: cbor_encoder::Decimal = "1.5".parse().unwrap();
    let root = Value::array([Value::from(decimal), shared.clone(), shared]);

    // The [exponent, mantissa] pair carries no tag 28 marker
    assert_eq!(
        encode_to_vec(&root, &sharing()).unwrap(),
        hex!("d81c 83 c4 82 20 0f d81c 81 01 d81d 01")
    );
}

#[test]
fn test_failed_encode_leaves_no_stale_stack_state() {
    let naive = chrono::NaiveDate::from_ymd_opt(2024, 1, 15)
        .unwrap()
        .and_hms_opt(10, 30, 0)
        .unwrap();
    let outer = Value::array([Value::from(1), Value::NaiveDateTime(naive)]);

    let mut buf = Vec::new();
    let options = no_sharing();
    let mut encoder = Encoder::with_options(&mut buf, &options);
    assert!(matches!(
        encoder.encode(&outer),
        Err(CborError::NaiveDateTime)
    ));

    // Drop the offending item; the same container must encode cleanly now
    outer.as_array().unwrap().borrow_mut().pop();
    encoder.encode(&outer).unwrap();
    drop(encoder);
    assert_eq!(buf, hex!("82 01 81 01"));
}

#[test]
fn test_share_indexes_reset_between_documents() {
    let list = Value::array([Value::from(7)]);
    let mut buf = Vec::new();
    let options = sharing();
    let mut encoder = Encoder::with_options(&mut buf, &options);
    encoder.encode(&list).unwrap();
    encoder.encode(&list).unwrap();
    drop(encoder);
    assert_eq!(buf, hex!("d81c 81 07 d81c 81 07"));
}

#[test]
fn test_sharing_is_opt_in() {
    let list = Value::array([Value::from(1)]);
    assert!(!EncoderOptions::default().value_sharing);
    assert_eq!(encode_to_vec(&list, &EncoderOptions::default()).unwrap(), hex!("81 01"));
    assert_eq!(encode_to_vec(&list, &sharing()).unwrap(), hex!("d81c 81 01"));
}
