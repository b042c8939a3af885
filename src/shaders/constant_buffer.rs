use crate::error::{Result, ShaderError};

use super::type_traits::TypeTable;

const CONSTANT_BUFFER_ALIGNMENT: usize = 16;
const PADDING_TYPE: &str = "uint";
const PADDING_PREFIX: &str = "DummyPaddingVar";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConstantBufferVariable {
    /// the HLSL type name
    pub declared_type: String,
    /// the C++ type name
    pub target_type: String,
    pub name: String,
    pub size: usize,
    /// added by `sanity_check`, never by the user
    pub padding: bool,
}

impl ConstantBufferVariable {
    pub fn is_padding(&self) -> bool {
        self.padding
    }
}

/// A 16-byte aligned block of shader constants.
/// Also used for the layout of shared structures.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConstantBuffer {
    pub name: String,
    pub register: u32,
    variables: Vec<ConstantBufferVariable>,
}

impl ConstantBuffer {
    pub fn new(name: impl Into<String>, register: u32) -> Self {
        Self {
            name: name.into(),
            register,
            variables: vec![],
        }
    }

    pub fn variables(&self) -> &[ConstantBufferVariable] {
        &self.variables
    }

    pub fn add_variable(&mut self, types: &TypeTable, declared_type: &str, name: &str) -> Result<()> {
        let type_trait = types.lookup(declared_type)?;

        self.variables.push(ConstantBufferVariable {
            declared_type: type_trait.declared,
            target_type: type_trait.target,
            name: name.to_string(),
            size: type_trait.size,
            padding: false,
        });

        Ok(())
    }

    pub fn byte_size(&self) -> usize {
        self.variables.iter().map(|v| v.size).sum()
    }

    /// Pads the buffer with `uint` variables until its size is a multiple of 16.
    /// Returns the number of padding variables added.
    pub fn sanity_check(&mut self) -> Result<usize> {
        let mut size = self.byte_size();
        let padding_type = TypeTable::new().lookup(PADDING_TYPE)?;

        if size % padding_type.size != 0 {
            return Err(ShaderError::UnalignedSize {
                name: self.name.clone(),
                size,
            });
        }

        let mut padding_count = 0;
        let mut suffix = 0;
        while size % CONSTANT_BUFFER_ALIGNMENT != 0 {
            // skip names the user already declared
            let name = loop {
                let name = format!("{PADDING_PREFIX}{suffix}");
                suffix += 1;
                if !self.variables.iter().any(|v| v.name == name) {
                    break name;
                }
            };

            self.variables.push(ConstantBufferVariable {
                declared_type: padding_type.declared.clone(),
                target_type: padding_type.target.clone(),
                name,
                size: padding_type.size,
                padding: true,
            });

            size += padding_type.size;
            padding_count += 1;
        }

        Ok(padding_count)
    }
}
