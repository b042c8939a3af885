use std::collections::BTreeMap;

use crate::error::{Result, ShaderError};

/// An HLSL type and its C++ mirror
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeTrait {
    pub declared: String,
    pub target: String,
    pub size: usize,
}

struct StaticTypeTrait {
    declared: &'static str,
    target: &'static str,
    size: usize,
}

#[rustfmt::skip]
const TYPE_TRAITS: &[StaticTypeTrait] = &[
    StaticTypeTrait { declared: "float",    target: "float",               size: 4 },
    StaticTypeTrait { declared: "float2",   target: "DirectX::XMFLOAT2",   size: 8 },
    StaticTypeTrait { declared: "float3",   target: "DirectX::XMFLOAT3",   size: 12 },
    StaticTypeTrait { declared: "float4",   target: "DirectX::XMFLOAT4",   size: 16 },
    StaticTypeTrait { declared: "float3x3", target: "DirectX::XMFLOAT3X3", size: 36 },
    StaticTypeTrait { declared: "float4x4", target: "DirectX::XMFLOAT4X4", size: 64 },
    StaticTypeTrait { declared: "int",      target: "int32_t",             size: 4 },
    StaticTypeTrait { declared: "int2",     target: "DirectX::XMINT2",     size: 8 },
    StaticTypeTrait { declared: "int3",     target: "DirectX::XMINT3",     size: 12 },
    StaticTypeTrait { declared: "int4",     target: "DirectX::XMINT4",     size: 16 },
    StaticTypeTrait { declared: "uint",     target: "uint32_t",            size: 4 },
    StaticTypeTrait { declared: "uint2",    target: "DirectX::XMUINT2",    size: 8 },
    StaticTypeTrait { declared: "uint3",    target: "DirectX::XMUINT3",    size: 12 },
    StaticTypeTrait { declared: "uint4",    target: "DirectX::XMUINT4",    size: 16 },
    StaticTypeTrait { declared: "bool",     target: "uint32_t",            size: 4 },
];

/// The builtin type table, extended with shared structures registered at run time.
#[derive(Debug, Default, Clone)]
pub struct TypeTable {
    structures: BTreeMap<String, usize>,
}

impl TypeTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_structure(&mut self, name: &str, size: usize) -> Result<()> {
        if builtin_type(name).is_some() || self.structures.contains_key(name) {
            return Err(ShaderError::DuplicateName {
                kind: "structure",
                name: name.to_string(),
            });
        }

        self.structures.insert(name.to_string(), size);
        Ok(())
    }

    pub fn is_structure(&self, name: &str) -> bool {
        self.structures.contains_key(name)
    }

    pub fn lookup(&self, declared: &str) -> Result<TypeTrait> {
        if let Some(builtin) = builtin_type(declared) {
            return Ok(TypeTrait {
                declared: builtin.declared.to_string(),
                target: builtin.target.to_string(),
                size: builtin.size,
            });
        }

        match self.structures.get(declared) {
            // structures share their name across both languages
            Some(&size) => Ok(TypeTrait {
                declared: declared.to_string(),
                target: declared.to_string(),
                size,
            }),
            None => Err(ShaderError::UnknownType(declared.to_string())),
        }
    }
}

fn builtin_type(declared: &str) -> Option<&'static StaticTypeTrait> {
    TYPE_TRAITS.iter().find(|t| t.declared == declared)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceKind {
    /// bound through a `t` register
    ShaderResource,
    /// bound through a `u` register
    UnorderedAccess,
}

impl ResourceKind {
    pub fn register_prefix(self) -> char {
        match self {
            Self::ShaderResource => 't',
            Self::UnorderedAccess => 'u',
        }
    }
}

#[derive(Debug, PartialEq, Eq)]
pub struct ResourceTrait {
    pub name: &'static str,
    pub kind: ResourceKind,
    pub structured: bool,
}

const fn srv(name: &'static str, structured: bool) -> ResourceTrait {
    ResourceTrait {
        name,
        kind: ResourceKind::ShaderResource,
        structured,
    }
}

const fn uav(name: &'static str, structured: bool) -> ResourceTrait {
    ResourceTrait {
        name,
        kind: ResourceKind::UnorderedAccess,
        structured,
    }
}

const RESOURCE_TRAITS: &[ResourceTrait] = &[
    srv("Texture1D", false),
    srv("Texture2D", false),
    srv("Texture2DArray", false),
    srv("Texture3D", false),
    srv("TextureCube", false),
    srv("Buffer", false),
    srv("ByteAddressBuffer", false),
    srv("StructuredBuffer", true),
    uav("RWTexture1D", false),
    uav("RWTexture2D", false),
    uav("RWTexture2DArray", false),
    uav("RWTexture3D", false),
    uav("RWBuffer", false),
    uav("RWByteAddressBuffer", false),
    uav("RWStructuredBuffer", true),
    uav("AppendStructuredBuffer", true),
    uav("ConsumeStructuredBuffer", true),
];

pub fn resource_trait(name: &str) -> Result<&'static ResourceTrait> {
    RESOURCE_TRAITS
        .iter()
        .find(|r| r.name == name)
        .ok_or_else(|| ShaderError::UnknownResourceType(name.to_string()))
}
