use std::fmt;

use crate::version::ExchangeVersion;

/// Behaviour switches of a [`PropertyDefinition`].
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct PropertyFlags(u16);

impl PropertyFlags {
    pub const NONE: Self = Self(0);
    /// May be assigned on an object that has not been saved yet.
    pub const CAN_SET: Self = Self(1);
    /// May be changed on an existing object (`SetItemField`).
    pub const CAN_UPDATE: Self = Self(1 << 1);
    /// May be removed from an existing object (`DeleteItemField`).
    pub const CAN_DELETE: Self = Self(1 << 2);
    /// Returned by `FindItem`/`FindFolder`.
    pub const CAN_FIND: Self = Self(1 << 3);
    /// Not part of the default shape; must be requested by name.
    pub const MUST_BE_EXPLICITLY_LOADED: Self = Self(1 << 4);
    /// Updates keep the existing instance instead of replacing it.
    pub const REUSE_INSTANCE: Self = Self(1 << 5);
    /// Reading an unset collection yields an empty collection.
    pub const AUTO_INSTANTIATE_ON_READ: Self = Self(1 << 6);

    /// `CAN_SET | CAN_UPDATE | CAN_FIND`
    pub const EDITABLE: Self = Self::CAN_SET.union(Self::CAN_UPDATE).union(Self::CAN_FIND);
    /// `CAN_SET | CAN_UPDATE | CAN_DELETE | CAN_FIND`
    pub const EDITABLE_DELETABLE: Self = Self::EDITABLE.union(Self::CAN_DELETE);

    pub const fn union(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }

    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }
}

impl std::ops::BitOr for PropertyFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        self.union(rhs)
    }
}

impl fmt::Debug for PropertyFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        const NAMES: [(PropertyFlags, &str); 7] = [
            (PropertyFlags::CAN_SET, "CAN_SET"),
            (PropertyFlags::CAN_UPDATE, "CAN_UPDATE"),
            (PropertyFlags::CAN_DELETE, "CAN_DELETE"),
            (PropertyFlags::CAN_FIND, "CAN_FIND"),
            (PropertyFlags::MUST_BE_EXPLICITLY_LOADED, "MUST_BE_EXPLICITLY_LOADED"),
            (PropertyFlags::REUSE_INSTANCE, "REUSE_INSTANCE"),
            (PropertyFlags::AUTO_INSTANTIATE_ON_READ, "AUTO_INSTANTIATE_ON_READ"),
        ];
        let set: Vec<&str> = NAMES
            .iter()
            .filter(|(flag, _)| self.contains(*flag))
            .map(|(_, name)| *name)
            .collect();
        if set.is_empty() {
            f.write_str("NONE")
        } else {
            f.write_str(&set.join(" | "))
        }
    }
}

/// Wire representation of a property value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PropertyKind {
    String,
    Boolean,
    Integer,
    DateTime,
    /// A string restricted to the listed tokens.
    Enum(&'static [&'static str]),
    ItemId,
    FolderId,
    Body,
    EmailAddress,
    EmailAddressCollection,
    Attendees,
    StringList,
}

impl PropertyKind {
    pub fn is_collection(self) -> bool {
        matches!(
            self,
            PropertyKind::EmailAddressCollection | PropertyKind::Attendees | PropertyKind::StringList
        )
    }
}

/// Static description of one schema property.
#[derive(Debug, PartialEq, Eq)]
pub struct PropertyDefinition {
    /// Element name inside the object element, e.g. `Subject`.
    pub xml_name: &'static str,
    /// `FieldURI` used in shapes and update operations, e.g. `item:Subject`.
    pub field_uri: &'static str,
    pub kind: PropertyKind,
    pub flags: PropertyFlags,
    /// First schema version that knows this property.
    pub version: ExchangeVersion,
}

impl PropertyDefinition {
    pub const fn new(
        xml_name: &'static str,
        field_uri: &'static str,
        kind: PropertyKind,
        flags: PropertyFlags,
    ) -> Self {
        Self {
            xml_name,
            field_uri,
            kind,
            flags,
            version: ExchangeVersion::Exchange2007Sp1,
        }
    }

    pub const fn since(mut self, version: ExchangeVersion) -> Self {
        self.version = version;
        self
    }

    pub fn has_flag(&self, flag: PropertyFlags) -> bool {
        self.flags.contains(flag)
    }

    /// Whether the property is part of the `Default`/`AllProperties` shapes.
    pub fn is_first_class(&self) -> bool {
        !self.has_flag(PropertyFlags::MUST_BE_EXPLICITLY_LOADED)
    }

    pub fn is_supported_by(&self, version: ExchangeVersion) -> bool {
        version >= self.version
    }
}

impl fmt::Display for PropertyDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.field_uri)
    }
}
