/// A 2-byte big-endian identifier of a storage slot on the appliance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Address(pub u16);

impl Address {
    pub fn to_bytes(self) -> [u8; 2] {
        self.0.to_be_bytes()
    }

    pub fn from_bytes(bytes: [u8; 2]) -> Self {
        Address(u16::from_be_bytes(bytes))
    }

    /// Address of the `index`-th element of an array of `member_size`-byte members
    /// starting at this address.
    pub fn offset(self, index: usize, member_size: usize) -> Address {
        Address(self.0 + (index * member_size) as u16)
    }
}

impl std::fmt::Display for Address {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:#06x}", self.0)
    }
}
