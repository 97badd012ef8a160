//! GY-043: Digest operations. Output is lowercase hex.

use super::{arg_str, arg_usize};
use crate::core::dish::DishValue;
use crate::core::error::OpError;
use crate::core::operation::{
    ArgKind, ArgSpec, Literal, OpMeta, Operation, OperationRegistryBuilder,
};
use crate::core::types::{ArgValue, TypeTag};
use md5::Md5;
use sha2::{Digest, Sha224, Sha256, Sha384, Sha512};

pub fn register(builder: &mut OperationRegistryBuilder) {
    builder.register(Sha2).register(Md5Hash).register(Blake3);
}

const SHA2_SIZES: &[&str] = &["256", "384", "512", "224"];

static SHA2: OpMeta = OpMeta {
    name: "SHA2",
    module: "Crypto",
    description: "The SHA-2 (Secure Hash Algorithm 2) hash functions were designed by the NSA. The message digest is 224, 256, 384 or 512 bits long.",
    input_type: TypeTag::ArrayBuffer,
    output_type: TypeTag::String,
    presentation_type: None,
    args: &[ArgSpec {
        name: "Size",
        kind: ArgKind::Option(SHA2_SIZES),
        default: Literal::Str("256"),
    }],
    flow_control: false,
};

pub struct Sha2;

impl Operation for Sha2 {
    fn meta(&self) -> &'static OpMeta {
        &SHA2
    }

    fn run(&self, input: DishValue, args: &[ArgValue]) -> Result<DishValue, OpError> {
        let bytes = input.into_bytes()?;
        let digest = match arg_str(args, 0).as_str() {
            "224" => hex::encode(Sha224::digest(&bytes)),
            "256" => hex::encode(Sha256::digest(&bytes)),
            "384" => hex::encode(Sha384::digest(&bytes)),
            "512" => hex::encode(Sha512::digest(&bytes)),
            other => return Err(OpError::operation(format!("Unsupported SHA2 size: {}", other))),
        };
        Ok(DishValue::String(digest))
    }
}

static MD5: OpMeta = OpMeta {
    name: "MD5",
    module: "Crypto",
    description: "MD5 (Message-Digest 5) is a widely used hash function. It is no longer considered secure.",
    input_type: TypeTag::ArrayBuffer,
    output_type: TypeTag::String,
    presentation_type: None,
    args: &[],
    flow_control: false,
};

pub struct Md5Hash;

impl Operation for Md5Hash {
    fn meta(&self) -> &'static OpMeta {
        &MD5
    }

    fn run(&self, input: DishValue, _args: &[ArgValue]) -> Result<DishValue, OpError> {
        let bytes = input.into_bytes()?;
        Ok(DishValue::String(hex::encode(Md5::digest(&bytes))))
    }
}

static BLAKE3: OpMeta = OpMeta {
    name: "BLAKE3",
    module: "Crypto",
    description: "Hashes the input using BLAKE3. The output length is configurable; a 32-byte key switches to keyed mode.",
    input_type: TypeTag::ArrayBuffer,
    output_type: TypeTag::String,
    presentation_type: None,
    args: &[
        ArgSpec {
            name: "Size (bytes)",
            kind: ArgKind::Number,
            default: Literal::Num(32.0),
        },
        ArgSpec {
            name: "Key",
            kind: ArgKind::String,
            default: Literal::Str(""),
        },
    ],
    flow_control: false,
};

pub struct Blake3;

impl Operation for Blake3 {
    fn meta(&self) -> &'static OpMeta {
        &BLAKE3
    }

    fn run(&self, input: DishValue, args: &[ArgValue]) -> Result<DishValue, OpError> {
        let bytes = input.into_bytes()?;
        let size = arg_usize(args, 0).unwrap_or(32);
        if size == 0 {
            return Err(OpError::operation("Size must be at least one byte"));
        }
        let key = arg_str(args, 1);
        let mut hasher = if key.is_empty() {
            blake3::Hasher::new()
        } else {
            let key: [u8; blake3::KEY_LEN] = key.as_bytes().try_into().map_err(|_| {
                OpError::operation(format!(
                    "Key must be exactly {} bytes, got {}",
                    blake3::KEY_LEN,
                    key.len()
                ))
            })?;
            blake3::Hasher::new_keyed(&key)
        };
        hasher.update(&bytes);
        let mut out = vec![0u8; size];
        hasher.finalize_xof().fill(&mut out);
        Ok(DishValue::String(hex::encode(out)))
    }
}
