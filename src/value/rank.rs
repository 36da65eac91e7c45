///
/// NullRank
///
/// Sort-time parameter controlling where NULL-like values land relative to
/// non-null values. `First` corresponds to the wire value -1, `Last` to +1.
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum NullRank {
    First,
    Last,
}

impl NullRank {
    #[must_use]
    pub const fn from_nulls_lowest(nulls_lowest: bool) -> Self {
        if nulls_lowest {
            Self::First
        } else {
            Self::Last
        }
    }

    #[must_use]
    pub const fn as_wire(self) -> i32 {
        match self {
            Self::First => -1,
            Self::Last => 1,
        }
    }
}
