//! Externally defined identifier types. The engine only compares and hashes these, it never looks
//! inside them beyond what is needed to move them on and off the wire.

use std::{fmt, str::FromStr};

use base64::{engine::general_purpose::STANDARD, Engine};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

macro_rules! service_id {
	($(#[$meta:meta])* $name:ident) => {
		$(#[$meta])*
		#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
		pub struct $name(Uuid);

		impl $name {
			#[must_use]
			pub const fn from_uuid(uuid: Uuid) -> Self {
				Self(uuid)
			}

			/// Wire form is exactly 16 bytes.
			#[must_use]
			pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
				Uuid::from_slice(bytes).ok().map(Self)
			}

			#[must_use]
			pub fn to_bytes(&self) -> Vec<u8> {
				self.0.as_bytes().to_vec()
			}

			#[must_use]
			pub const fn uuid(&self) -> Uuid {
				self.0
			}
		}

		impl fmt::Display for $name {
			fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
				write!(f, "{}:{}", stringify!($name), self.0)
			}
		}

		impl FromStr for $name {
			type Err = uuid::Error;

			fn from_str(s: &str) -> Result<Self, Self::Err> {
				Uuid::parse_str(s).map(Self)
			}
		}
	};
}

service_id!(
	/// Stable account identifier.
	Aci
);

service_id!(
	/// Privacy preserving secondary identifier, tied to a phone number.
	Pni
);

/// Phone number in E.164 form: a `+` followed by 1 to 15 digits, the first one non zero.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct E164(String);

impl E164 {
	#[must_use]
	pub fn parse(value: &str) -> Option<Self> {
		let digits = value.strip_prefix('+')?;

		(!digits.is_empty()
			&& digits.len() <= 15
			&& digits.bytes().all(|b| b.is_ascii_digit())
			&& !digits.starts_with('0'))
		.then(|| Self(value.to_string()))
	}

	/// Zero is how the wire format says "unset".
	#[must_use]
	pub fn from_u64(value: u64) -> Option<Self> {
		if value == 0 {
			return None;
		}

		Self::parse(&format!("+{value}"))
	}

	#[must_use]
	pub fn to_u64(&self) -> u64 {
		// Holds by construction: at most 15 ascii digits always fit in a u64.
		self.0[1..]
			.bytes()
			.fold(0, |acc, b| acc * 10 + u64::from(b - b'0'))
	}

	#[must_use]
	pub fn as_str(&self) -> &str {
		&self.0
	}
}

impl fmt::Display for E164 {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(&self.0)
	}
}

#[derive(Debug, thiserror::Error)]
#[error("invalid E164 phone number: '{0}'")]
pub struct InvalidE164(String);

impl FromStr for E164 {
	type Err = InvalidE164;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		Self::parse(s).ok_or_else(|| InvalidE164(s.to_string()))
	}
}

/// Opaque group identifier; never empty.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GroupId(Vec<u8>);

impl GroupId {
	#[must_use]
	pub fn new(bytes: Vec<u8>) -> Option<Self> {
		(!bytes.is_empty()).then_some(Self(bytes))
	}

	#[must_use]
	pub fn as_bytes(&self) -> &[u8] {
		&self.0
	}
}

impl fmt::Display for GroupId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(&STANDARD.encode(&self.0))
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DistributionId(Uuid);

impl DistributionId {
	/// The distribution list every account has, "My Story".
	pub const MY_STORY: Self = Self(Uuid::nil());

	#[must_use]
	pub const fn from_uuid(uuid: Uuid) -> Self {
		Self(uuid)
	}

	#[must_use]
	pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
		Uuid::from_slice(bytes).ok().map(Self)
	}

	#[must_use]
	pub fn to_bytes(&self) -> Vec<u8> {
		self.0.as_bytes().to_vec()
	}

	#[must_use]
	pub fn is_my_story(&self) -> bool {
		*self == Self::MY_STORY
	}
}

impl fmt::Display for DistributionId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(&STANDARD.encode(self.0.as_bytes()))
	}
}

/// Everything we may know about a contact. At least one identifier is always present.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContactAddress {
	aci: Option<Aci>,
	pni: Option<Pni>,
	e164: Option<E164>,
}

impl ContactAddress {
	#[must_use]
	pub fn new(aci: Option<Aci>, pni: Option<Pni>, e164: Option<E164>) -> Option<Self> {
		(aci.is_some() || pni.is_some() || e164.is_some()).then_some(Self { aci, pni, e164 })
	}

	#[must_use]
	pub const fn from_aci(aci: Aci) -> Self {
		Self {
			aci: Some(aci),
			pni: None,
			e164: None,
		}
	}

	#[must_use]
	pub const fn aci(&self) -> Option<Aci> {
		self.aci
	}

	#[must_use]
	pub const fn pni(&self) -> Option<Pni> {
		self.pni
	}

	#[must_use]
	pub const fn e164(&self) -> Option<&E164> {
		self.e164.as_ref()
	}

	/// True when both addresses share any identifier.
	#[must_use]
	pub fn overlaps(&self, other: &Self) -> bool {
		matches!((self.aci, other.aci), (Some(a), Some(b)) if a == b)
			|| matches!((self.pni, other.pni), (Some(a), Some(b)) if a == b)
			|| matches!((&self.e164, &other.e164), (Some(a), Some(b)) if a == b)
	}
}

impl fmt::Display for ContactAddress {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let mut parts = Vec::with_capacity(3);
		if let Some(aci) = &self.aci {
			parts.push(aci.to_string());
		}
		if let Some(pni) = &self.pni {
			parts.push(pni.to_string());
		}
		if let Some(e164) = &self.e164 {
			// Phone numbers stay out of logs.
			parts.push(format!("E164:***{}", &e164.as_str()[e164.as_str().len().saturating_sub(2)..]));
		}

		write!(f, "[{}]", parts.join(", "))
	}
}

/// Identifiers of the account running the backup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalIdentifiers {
	pub aci: Aci,
	pub pni: Option<Pni>,
	pub phone_number: E164,
}

impl LocalIdentifiers {
	#[must_use]
	pub const fn new(aci: Aci, pni: Option<Pni>, phone_number: E164) -> Self {
		Self {
			aci,
			pni,
			phone_number,
		}
	}

	#[must_use]
	pub fn address(&self) -> ContactAddress {
		ContactAddress {
			aci: Some(self.aci),
			pni: self.pni,
			e164: Some(self.phone_number.clone()),
		}
	}

	#[must_use]
	pub fn contains(&self, address: &ContactAddress) -> bool {
		self.address().overlaps(address)
	}
}
