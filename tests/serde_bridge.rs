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

// Serialize types going through `to_vec` / `to_value`
//
// Newtype structs are transparent: a newtype around a HashMap must come out as
// a map (major type 5), not as an array holding a map.

use std::collections::{BTreeMap, HashMap};

use cbor_encoder::{EncoderOptions, Value, encode_to_vec, to_value, to_vec};
use hex_literal::hex;
use serde::Serialize;
use serde_bytes::ByteBuf;

#[test]
fn test_newtype_hashmap_is_map_not_array() {
    #[derive(Debug, Serialize)]
    struct TimeStamp(pub HashMap<String, ByteBuf>);

    let mut map = HashMap::new();
    map.insert("key1".to_string(), ByteBuf::from(vec![1, 2, 3]));
    map.insert("key2".to_string(), ByteBuf::from(vec![4, 5, 6]));

    let cbor_bytes = to_vec(&TimeStamp(map)).expect("serialize");
    let major_type = cbor_bytes[0] >> 5;
    assert_eq!(
        major_type, 5,
        "Newtype struct wrapping HashMap should serialize as a map, got major type {major_type}"
    );
    assert_eq!(cbor_bytes[0], 0xa2);
}

#[test]
fn test_newtype_btreemap_exact_bytes() {
    #[derive(Serialize)]
    struct Metadata(BTreeMap<String, String>);

    let mut map = BTreeMap::new();
    map.insert("a".to_string(), "b".to_string());
    assert_eq!(to_vec(&Metadata(map)).unwrap(), hex!("a1 6161 6162"));
}

#[test]
fn test_byte_buffers_vs_byte_vectors() {
    // serde_bytes goes through serialize_bytes, a plain Vec<u8> is a sequence
    assert_eq!(to_vec(&ByteBuf::from(vec![1, 2])).unwrap(), hex!("42 0102"));
    assert_eq!(to_vec(&vec![1u8, 2]).unwrap(), hex!("82 01 02"));
}

#[test]
fn test_json_value() {
    let json = serde_json::json!({
        "name": "cbor",
        "tags": [1, 2.5, null, true],
    });
    let value = to_value(&json).unwrap();
    let map = value.as_map().unwrap().borrow();
    assert_eq!(map.len(), 2);
    drop(map);

    // serde_json orders object keys alphabetically by default
    assert_eq!(
        encode_to_vec(&value, &EncoderOptions::default()).unwrap(),
        hex!("a2 646e616d65 6463626f72 6474616773 84 01 fb4004000000000000 f6 f5")
    );
}

#[test]
fn test_enums() {
    #[derive(Serialize)]
    enum Op {
        Stop,
        Move(i8),
        Swap(u8, u8),
        Jump { to: u16 },
    }

    assert_eq!(to_vec(&Op::Stop).unwrap(), hex!("64 53746f70"));
    assert_eq!(to_vec(&Op::Move(-3)).unwrap(), hex!("a1 644d6f7665 22"));
    assert_eq!(to_vec(&Op::Swap(1, 2)).unwrap(), hex!("a1 6453776170 82 01 02"));
    assert_eq!(
        to_vec(&Op::Jump { to: 300 }).unwrap(),
        hex!("a1 644a756d70 a1 62746f 19012c")
    );
}

#[test]
fn test_options_and_units() {
    #[derive(Serialize)]
    struct Unit;

    assert_eq!(to_vec(&Some(5u8)).unwrap(), hex!("05"));
    assert_eq!(to_vec(&None::<u8>).unwrap(), hex!("f6"));
    assert_eq!(to_vec(&()).unwrap(), hex!("f6"));
    assert_eq!(to_vec(&Unit).unwrap(), hex!("f6"));
    assert_eq!(to_vec(&'x').unwrap(), hex!("61 78"));
}

#[test]
fn test_wide_integers() {
    assert_eq!(to_vec(&u64::MAX).unwrap(), hex!("1b ffffffffffffffff"));
    assert_eq!(to_vec(&i64::MIN).unwrap(), hex!("3b 7fffffffffffffff"));
    assert_eq!(
        to_vec(&u128::MAX).unwrap(),
        hex!("c2 50 ffffffffffffffffffffffffffffffff")
    );
}

#[test]
fn test_serde_values_mix_with_value_graph() {
    #[derive(Serialize)]
    struct Entry {
        id: u32,
    }

    let entry = to_value(&Entry { id: 7 }).unwrap();
    let root = Value::array([entry.clone(), entry]);
    let sharing = EncoderOptions::default().with_value_sharing(true);
    assert_eq!(
        encode_to_vec(&root, &sharing).unwrap(),
        hex!("d81c 82 d81c a1 6269 64 07 d81d 01")
    );
}
