use super::types::{Address, Hash, U256};
use super::*;
use serde::Serialize;

use core::fmt::Debug;

/*
Python code to split output from remix into chunks of 32 bytes, the annotations
are done manually.
```python
s = "..."
print(*(s[i:i+64] for i in range(0, len(s), 64)), sep="\n")
```
*/

struct AssertWriter<'a, I>
where
    I: Iterator<Item = (&'a str, &'a str)>,
{
    expected_iter: I,
}

struct Slot<'a>(&'a [u8]);

impl<'a> Debug for Slot<'a> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

impl<'a> PartialEq for Slot<'a> {
    fn eq(&self, other: &Self) -> bool {
        self.0 == other.0
    }
}

impl<'a, I> Writer for AssertWriter<'a, I>
where
    I: Iterator<Item = (&'a str, &'a str)>,
{
    fn write(&mut self, slot: &[u8]) {
        match self.expected_iter.next() {
            Some((expected, line)) => {
                assert_eq!(
                    expected.len(),
                    64,
                    "The expected input must be grouped into slots of 32 bytes as hex, without 0x."
                );
                assert_eq!(slot.len(), 32, "Each slot should have 32 bytes.");

                println!("{}", line);

                let expected = hex::decode(expected).unwrap();
                assert_eq!(
                    Slot(slot),
                    Slot(expected.as_slice()),
                    "slot did not match the expected value"
                );
            }
            None => {
                panic!("Expected end of data, got {:?}", Slot(slot));
            }
        }
    }
}

// Iterate over the expected content, extracting the slot information (32-byte
// hex string at the beginning, skipping empty lines). Anything after the slot
// is a comment.
macro_rules! expected_iter {
    ( $expected:expr ) => {
        $expected
            .split('\n')
            .filter(|&line| !line.trim().is_empty())
            .map(|line| {
                if line.trim().len() < 64 {
                    panic!("expected line is too short, it must start with a 32 byte hex string!");
                };
                (&line.trim()[..64], line)
            })
    };
}

fn serialize_and_compare_fnargs<T>(value: &T, expected: &str)
where
    T: Serialize,
{
    let mut writer = AssertWriter {
        expected_iter: expected_iter!(expected),
    };
    ser::to_fnargs_writer(&value, &mut writer).unwrap();

    let next = writer.expected_iter.next();
    assert_eq!(next, None, "there are less slots than expected.");
}

fn serialize_and_compare<T>(value: &T, expected: &str)
where
    T: Serialize,
{
    let mut writer = AssertWriter {
        expected_iter: expected_iter!(expected),
    };
    to_writer(&value, &mut writer).unwrap();

    let next = writer.expected_iter.next();
    assert_eq!(next, None, "there are less slots than expected.");
}

trait BytesContainer {
    fn gen(base: u8) -> Self;
}

#[derive(Serialize, Debug)]
struct BytesContainerViaTupleAttr(#[serde(with = "as_bytes")] [u8; 4]);
impl BytesContainer for BytesContainerViaTupleAttr {
    fn gen(base: u8) -> Self {
        Self([0x01 | base, 0x02 | base, 0x03 | base, 0x04 | base])
    }
}

#[derive(Serialize, Debug)]
struct BytesContainerViaNormalAttr {
    #[serde(with = "as_bytes")]
    value: [u8; 4],
}
impl BytesContainer for BytesContainerViaNormalAttr {
    fn gen(base: u8) -> Self {
        Self {
            value: [0x01 | base, 0x02 | base, 0x03 | base, 0x04 | base],
        }
    }
}

#[test]
fn u64() {
    /*
    ```solidity
        function u64() public pure returns(bytes memory) {
            uint64 d = 0x1337000012341111;
            return abi.encode(d);
        }
    ```
    */
    let d: u64 = 0x1337000012341111;

    let expected = "
    0000000000000000000000000000000000000000000000001337000012341111
    ";
    serialize_and_compare(&d, expected)
}

#[test]
fn negative_int_is_sign_extended() {
    let d: i8 = -2;

    let expected = "
    fffffffffffffffffffffffffffffffffffffffffffffffffffffffffffffffe
    ";
    serialize_and_compare(&d, expected)
}

#[test]
fn u256() {
    let d = U256::from(0xdeadbeefu64) << 128usize;

    let expected = "
    000000000000000000000000deadbeef00000000000000000000000000000000
    ";
    serialize_and_compare(&d, expected)
}

#[test]
fn address_in_container() {
    /*
    ```solidity
        struct AddressContainerData {
            address a;
        }
        function AddressContainer() public pure returns(bytes memory) {
            AddressContainerData memory d;
            d.a = 0x95222290DD7278Aa3Ddd389Cc1E1d165CC4BAfe5;
            return abi.encode(d);
        }
    ```
    */
    let addr: Address = "0x95222290DD7278Aa3Ddd389Cc1E1d165CC4BAfe5"
        .parse()
        .unwrap();

    #[derive(Serialize, Debug)]
    struct AddrContainer {
        a: Address,
    }

    // Not a dynamic type => No 0x0000..0020 added in the beginning.
    let expected = "
00000000000000000000000095222290dd7278aa3ddd389cc1e1d165cc4bafe5
    ";
    serialize_and_compare(&AddrContainer { a: addr }, expected)
}

mod bytes {
    use super::*;

    #[derive(Serialize, Debug)]
    #[serde(transparent)]
    struct BytesViaTupleAttr(#[serde(with = "as_bytes")] [u8; 4]);

    #[derive(Serialize, Debug)]
    #[serde(transparent)]
    struct BytesViaNormalAttr {
        #[serde(with = "as_bytes")]
        value: [u8; 4],
    }

    /*
    ```solidity
        function Bytes() public pure returns(bytes memory) {
            bytes memory d;
            d = "\xa1\xa2\xa3\xa4";
            return abi.encode(d);
        }
    ```
    */
    const EXPECTED: &str = "
    0000000000000000000000000000000000000000000000000000000000000020
    0000000000000000000000000000000000000000000000000000000000000004
    a1a2a3a400000000000000000000000000000000000000000000000000000000
    ";

    #[test]
    fn normal_attr() {
        serialize_and_compare(
            &BytesViaNormalAttr {
                value: [0xa1, 0xa2, 0xa3, 0xa4],
            },
            EXPECTED,
        );
    }

    #[test]
    fn tuple_attr() {
        serialize_and_compare(&BytesViaTupleAttr([0xa1, 0xa2, 0xa3, 0xa4]), EXPECTED);
    }

    /*
    ```solidity
        function BytesZero() public pure returns(bytes memory) {
            bytes memory d;
            d = "";
            return abi.encode(d);
        }
    ```
    */
    const EXPECTED_ZERO: &str = "
    0000000000000000000000000000000000000000000000000000000000000020
    0000000000000000000000000000000000000000000000000000000000000000
    ";

    #[test]
    fn zerolen_fixedarray() {
        #[derive(Serialize, Debug)]
        #[serde(transparent)]
        struct BytesZero {
            #[serde(with = "as_bytes")]
            value: [u8; 0],
        }
        serialize_and_compare(&BytesZero { value: [] }, EXPECTED_ZERO);
    }

    #[test]
    fn zerolen_vector() {
        #[derive(Serialize, Debug)]
        #[serde(transparent)]
        struct BytesZero {
            #[serde(with = "as_bytes")]
            value: Vec<u8>,
        }
        serialize_and_compare(&BytesZero { value: vec![] }, EXPECTED_ZERO);
    }

    #[test]
    fn longer_than_one_slot() {
        #[derive(Serialize, Debug)]
        #[serde(transparent)]
        struct Long {
            #[serde(with = "as_bytes")]
            value: Vec<u8>,
        }
        let d = Long {
            value: vec![0x11; 33],
        };

        let expected = "
    0000000000000000000000000000000000000000000000000000000000000020
    0000000000000000000000000000000000000000000000000000000000000021
    1111111111111111111111111111111111111111111111111111111111111111
    1100000000000000000000000000000000000000000000000000000000000000
    ";
        serialize_and_compare(&d, expected);
    }

    #[test]
    fn string() {
        let expected = "
    0000000000000000000000000000000000000000000000000000000000000020
    0000000000000000000000000000000000000000000000000000000000000004
    6461766500000000000000000000000000000000000000000000000000000000
    ";
        serialize_and_compare(&"dave", expected);
    }
}

mod bytescontainer {
    use super::*;

    fn run<T>()
    where
        T: BytesContainer,
        T: Serialize,
    {
        /*
        ```solidity
            struct BytesContainerData {
                bytes a;
            }
            function BytesContainer() public pure returns(bytes memory) {
                BytesContainerData memory d;
                d.a = "\xa1\xa2\xa3\xa4";
                return abi.encode(d);
            }
        ```
        */
        let d = T::gen(0xa0);

        let expected = "
0000000000000000000000000000000000000000000000000000000000000020 // d offset
    0000000000000000000000000000000000000000000000000000000000000020 // d.a offset
        0000000000000000000000000000000000000000000000000000000000000004 // d.a length
        a1a2a3a400000000000000000000000000000000000000000000000000000000 // d.a
    ";
        serialize_and_compare(&d, expected);
    }

    #[test]
    fn normal() {
        run::<BytesContainerViaNormalAttr>()
    }

    #[test]
    fn tuple() {
        run::<BytesContainerViaTupleAttr>()
    }
}

mod dynstruct_in {
    use super::*;

    fn fixed<T>()
    where
        T: Serialize,
        T: BytesContainer,
    {
        /*
        ```solidity
            struct DynstructInFixedarrayInnerData {
                bytes v;
            }
            struct DynstructInFixedarrayData {
                DynstructInFixedarrayInnerData[2] a;
                bytes b;
            }
            function DynstructInFixedarray() public pure returns(bytes memory) {
                DynstructInFixedarrayData memory d;
                d.a[0].v = "\xa1\xa2\xa3\xa4";
                d.a[1].v = "\xb1\xb2\xb3\xb4";
                d.b = "\x11\x22\x33\x44\x55";
                return abi.encode(d);
            }
        ```
        */
        #[derive(Serialize, Debug)]
        struct DynstructInFixedarray<T> {
            a: [T; 2],
            #[serde(with = "as_bytes")]
            b: [u8; 5],
        }

        let d = DynstructInFixedarray {
            a: [T::gen(0xa0), T::gen(0xb0)],
            b: [0x11, 0x22, 0x33, 0x44, 0x55],
        };

        let expected = "
0000000000000000000000000000000000000000000000000000000000000020 // d offset
    0000000000000000000000000000000000000000000000000000000000000040 // d.a offset
    0000000000000000000000000000000000000000000000000000000000000140 // d.b offset
        0000000000000000000000000000000000000000000000000000000000000040 // d.a[0] offset
        00000000000000000000000000000000000000000000000000000000000000a0 // d.a[1] offset
            0000000000000000000000000000000000000000000000000000000000000020 // d.a[0].v offset
                0000000000000000000000000000000000000000000000000000000000000004 // d.a[0].v length
                a1a2a3a400000000000000000000000000000000000000000000000000000000 // d.a[0].v

            0000000000000000000000000000000000000000000000000000000000000020 // d.a[1].v offset
                0000000000000000000000000000000000000000000000000000000000000004 // d.a[1].v length
                b1b2b3b400000000000000000000000000000000000000000000000000000000 // d.a[1].v

        0000000000000000000000000000000000000000000000000000000000000005 // d.b length
        1122334455000000000000000000000000000000000000000000000000000000 // d.b
        ";
        serialize_and_compare(&d, expected);
    }

    fn dynamic<T>()
    where
        T: Serialize,
        T: BytesContainer,
    {
        /*
        ```solidity
            struct DynstructInDynarrayInnerData {
                bytes v;
            }
            struct DynstructInDynarrayData {
                DynstructInDynarrayInnerData[] a;
                bytes b;
            }
            function DynstructInDynarray() public pure returns(bytes memory) {
                DynstructInDynarrayData memory d;
                d.a = new DynstructInDynarrayInnerData[](2);
                d.a[0].v = "\xa1\xa2\xa3\xa4";
                d.a[1].v = "\xb1\xb2\xb3\xb4";
                d.b = "\x11\x22\x33\x44\x55";
                return abi.encode(d);
            }
        ```
        */
        #[derive(Serialize, Debug)]
        struct DynstructInDynarray<T>
        where
            T: Serialize,
        {
            #[serde(with = "as_dyn_array")]
            a: [T; 2],
            #[serde(with = "as_bytes")]
            b: [u8; 5],
        }

        let d = DynstructInDynarray {
            a: [T::gen(0xa0), T::gen(0xb0)],
            b: [0x11, 0x22, 0x33, 0x44, 0x55],
        };

        let expected = "
0000000000000000000000000000000000000000000000000000000000000020 // d offset
    0000000000000000000000000000000000000000000000000000000000000040 // d.a offset
    0000000000000000000000000000000000000000000000000000000000000160 // d.b offset
        0000000000000000000000000000000000000000000000000000000000000002 // d.a length
        0000000000000000000000000000000000000000000000000000000000000040 // d.a[0] offset
        00000000000000000000000000000000000000000000000000000000000000a0 // d.a[1] offset
            0000000000000000000000000000000000000000000000000000000000000020 // d.a[0].v offset
                0000000000000000000000000000000000000000000000000000000000000004 // d.a[0].v length
                a1a2a3a400000000000000000000000000000000000000000000000000000000 // d.a[0].v
            0000000000000000000000000000000000000000000000000000000000000020 // d.a[1].v offset
                0000000000000000000000000000000000000000000000000000000000000004 // d.a[1].v length
                b1b2b3b400000000000000000000000000000000000000000000000000000000 // d.a[1].v

        0000000000000000000000000000000000000000000000000000000000000005 // d.b length
        1122334455000000000000000000000000000000000000000000000000000000 // d.b
        ";
        serialize_and_compare(&d, expected);
    }

    #[test]
    fn fixed_normal() {
        fixed::<BytesContainerViaNormalAttr>();
    }

    #[test]
    fn fixed_tuple() {
        fixed::<BytesContainerViaTupleAttr>();
    }

    #[test]
    fn dynamic_normal() {
        dynamic::<BytesContainerViaNormalAttr>();
    }

    #[test]
    fn dynamic_tuple() {
        dynamic::<BytesContainerViaTupleAttr>();
    }
}

mod staticstruct_in {
    use super::*;

    /*
    ```solidity
        struct StaticstructInFixedarrayInnerData {
            uint64 v;
        }
        struct StaticstructInFixedarrayData {
            StaticstructInFixedarrayInnerData[2] a;
            bytes b;
        }
        function StaticstructInFixedarray() public pure returns(bytes memory) {
            StaticstructInFixedarrayData memory d;
            d.a[0].v = 0xaa;
            d.a[1].v = 0xbb;
            d.b = "\x11\x22\x33\x44\x55";
            return abi.encode(d);
        }
    ```
    */
    const EXPECTED: &str = "
0000000000000000000000000000000000000000000000000000000000000020 // d offset
    00000000000000000000000000000000000000000000000000000000000000aa // d.a[0].v
    00000000000000000000000000000000000000000000000000000000000000bb // d.a[1].v
    0000000000000000000000000000000000000000000000000000000000000060 // d.b offset
        0000000000000000000000000000000000000000000000000000000000000005 // d.b length
        1122334455000000000000000000000000000000000000000000000000000000 // d.b
    ";

    #[test]
    fn normal() {
        // Not transparent because the struct exists on the solidity side, too
        #[derive(Serialize, Debug)]
        struct Inner {
            v: u64,
        }

        #[derive(Serialize, Debug)]
        struct StaticstructInFixedarray {
            a: [Inner; 2],
            #[serde(with = "as_bytes")]
            b: [u8; 5],
        }

        let d = StaticstructInFixedarray {
            a: [Inner { v: 0xaa }, Inner { v: 0xbb }],
            b: [0x11, 0x22, 0x33, 0x44, 0x55],
        };
        serialize_and_compare(&d, EXPECTED);
    }

    #[test]
    fn tuple() {
        #[derive(Serialize, Debug)]
        struct Inner(u64);

        #[derive(Serialize, Debug)]
        struct StaticstructInFixedarray {
            a: [Inner; 2],
            #[serde(with = "as_bytes")]
            b: [u8; 5],
        }

        let d = StaticstructInFixedarray {
            a: [Inner(0xaa), Inner(0xbb)],
            b: [0x11, 0x22, 0x33, 0x44, 0x55],
        };
        serialize_and_compare(&d, EXPECTED);
    }
}

// The following tests come from the solidity documentation:
// https://docs.soliditylang.org/en/v0.8.17/abi-spec.html#examples
//
// The method ID (4 bytes) is not part of the serializer output. Function
// arguments don't include the 0x20 offset of the outer struct, hence
// serialize_and_compare_fnargs.
mod solidity_docs {
    use super::*;

    #[test]
    fn foo_baz() {
        #[derive(Serialize, Debug)]
        struct Baz(u32, bool);

        let expected = "
0000000000000000000000000000000000000000000000000000000000000045
0000000000000000000000000000000000000000000000000000000000000001
    ";
        serialize_and_compare(&Baz(69, true), expected);
    }

    #[test]
    fn foo_baz_return() {
        serialize_and_compare_fnargs(
            &true,
            "0000000000000000000000000000000000000000000000000000000000000001",
        );
        serialize_and_compare_fnargs(
            &false,
            "0000000000000000000000000000000000000000000000000000000000000000",
        );
    }

    #[test]
    fn foo_sam() {
        #[derive(Serialize, Debug)]
        struct Sam<'a> {
            #[serde(with = "as_bytes")]
            name: &'a [u8],
            flag: bool,
            #[serde(with = "as_dyn_array")]
            values: [U256; 3],
        }

        let d = Sam {
            name: b"dave",
            flag: true,
            values: [U256::from(1), U256::from(2), U256::from(3)],
        };

        let expected = "
0000000000000000000000000000000000000000000000000000000000000060 // name offset
0000000000000000000000000000000000000000000000000000000000000001 // flag
00000000000000000000000000000000000000000000000000000000000000a0 // values offset
0000000000000000000000000000000000000000000000000000000000000004 // name length
6461766500000000000000000000000000000000000000000000000000000000 // name
0000000000000000000000000000000000000000000000000000000000000003 // values length
0000000000000000000000000000000000000000000000000000000000000001
0000000000000000000000000000000000000000000000000000000000000002
0000000000000000000000000000000000000000000000000000000000000003
    ";
        serialize_and_compare_fnargs(&d, expected);
    }
}

mod errors {
    use super::*;

    #[test]
    fn float_is_not_representable() {
        assert_eq!(
            ser::to_vec(&1.5f32),
            Err(Error::TypeNotRepresentable("f32"))
        );
    }

    #[test]
    fn option_is_not_representable() {
        let v: Option<u8> = None;
        assert_eq!(ser::to_vec(&v), Err(Error::TypeNotRepresentable("none")));
    }
}

#[test]
fn keccak_of_empty_input() {
    let expected: Hash = "0xc5d2460186f7233c927e7db2dcc703c0e500b653ca82273b7bfad8045d85a470"
        .parse()
        .unwrap();
    assert_eq!(hashing::keccak256(&[]), expected);
}

#[test]
fn to_hash_matches_hash_of_encoding() {
    let value = (U256::from(7), Address([0x42; 20]));
    let encoded = ser::to_vec(&value).unwrap();
    assert_eq!(to_hash(&value).unwrap(), hashing::keccak256(&encoded));
}

#[test]
fn hex_parsing_requires_lowercase_prefix() {
    let addr: Address = "0x4242424242424242424242424242424242424242".parse().unwrap();
    assert_eq!(addr, Address([0x42; 20]));

    assert_eq!(
        "0X4242424242424242424242424242424242424242".parse::<Address>(),
        Err(types::ParseHexError::MissingPrefix)
    );
    assert_eq!(
        "0x4242".parse::<Address>(),
        Err(types::ParseHexError::InvalidLength {
            expected: 20,
            actual: 2
        })
    );
}
