use std::fmt;

/// Location of one packet: its segment and the offset of its header.
///
/// Ordered by segment, then offset, which is the order results are
/// produced in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PacketPointer {
    pub segment: u32,
    pub offset: u64,
}

impl PacketPointer {
    pub fn new(segment: u32, offset: u64) -> Self {
        Self { segment, offset }
    }
}

impl fmt::Display for PacketPointer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.segment, self.offset)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ordering() {
        let mut pointers = vec![
            PacketPointer::new(2, 24),
            PacketPointer::new(1, 900),
            PacketPointer::new(1, 24),
        ];
        pointers.sort();
        assert_eq!(
            pointers,
            vec![
                PacketPointer::new(1, 24),
                PacketPointer::new(1, 900),
                PacketPointer::new(2, 24),
            ]
        );
        assert_eq!(pointers[2].to_string(), "2@24");
    }
}
