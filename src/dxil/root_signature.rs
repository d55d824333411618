/// A serialized root signature. Its contents are produced and parsed elsewhere.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RootSignature {
    data: Vec<u8>,
}

impl RootSignature {
    pub fn from_bytes(data: Vec<u8>) -> Self {
        Self { data }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}
