//! 枚举的线上表示：每个成员对应一个固定的字符串标签（而不是序号/成员名）。
//!
//! broker 只认字符串标签，因此每个枚举都维护一张显式的「成员 <-> 标签」双向表，
//! 序列化/反序列化都只查表。

use crate::error::BrokerError;

pub trait WireEnum: Sized + Copy + PartialEq + 'static {
    /// 出现在错误信息里的类型名。
    const KIND: &'static str;
    const TABLE: &'static [(Self, &'static str)];

    fn as_str(self) -> &'static str {
        Self::TABLE
            .iter()
            .find(|(member, _)| *member == self)
            .map(|(_, tag)| *tag)
            .unwrap_or_default()
    }

    /// 按标签精确匹配（区分大小写）。
    fn from_wire(value: &str) -> Result<Self, BrokerError> {
        Self::TABLE
            .iter()
            .find(|(_, tag)| *tag == value)
            .map(|(member, _)| *member)
            .ok_or_else(|| BrokerError::unknown_enum_value(Self::KIND, value))
    }

    fn all() -> impl Iterator<Item = Self> {
        Self::TABLE.iter().map(|(member, _)| *member)
    }
}

macro_rules! wire_enum {
    (
        $(#[$meta:meta])*
        $vis:vis enum $name:ident {
            $( $(#[$vmeta:meta])* $variant:ident => $tag:literal ),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        $vis enum $name {
            $( $(#[$vmeta])* $variant ),+
        }

        impl $crate::model::wire_enum::WireEnum for $name {
            const KIND: &'static str = stringify!($name);
            const TABLE: &'static [(Self, &'static str)] = &[$( ($name::$variant, $tag) ),+];
        }

        impl ::std::fmt::Display for $name {
            fn fmt(&self, f: &mut ::std::fmt::Formatter<'_>) -> ::std::fmt::Result {
                f.write_str(<Self as $crate::model::wire_enum::WireEnum>::as_str(*self))
            }
        }

        impl ::std::str::FromStr for $name {
            type Err = $crate::error::BrokerError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                <Self as $crate::model::wire_enum::WireEnum>::from_wire(s)
            }
        }

        impl ::serde::Serialize for $name {
            fn serialize<S: ::serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.serialize_str(<Self as $crate::model::wire_enum::WireEnum>::as_str(*self))
            }
        }

        impl<'de> ::serde::Deserialize<'de> for $name {
            fn deserialize<D: ::serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                let raw = <::std::borrow::Cow<'de, str> as ::serde::Deserialize>::deserialize(deserializer)?;
                <Self as $crate::model::wire_enum::WireEnum>::from_wire(&raw)
                    .map_err(::serde::de::Error::custom)
            }
        }
    };
}

pub(crate) use wire_enum;
