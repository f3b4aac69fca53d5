use num_bigint::BigUint;
use num_traits::{CheckedSub, Zero};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest, Sha256};
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign};
use std::str::FromStr;

pub const ADDRESS_LENGTH: usize = 20;

/// Number of fractional digits carried by every amount.
pub const DECIMALS: u8 = 18;

/// Seconds since the Unix epoch.
pub type Timestamp = u64;

// --- NewTypes ---

#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Address(pub [u8; ADDRESS_LENGTH]);

impl Address {
    /// Deterministic address from the trailing 20 bytes of `sha256(seed)`.
    pub fn derive(seed: &[u8]) -> Self {
        let digest = Sha256::digest(seed);
        let mut arr = [0u8; ADDRESS_LENGTH];
        arr.copy_from_slice(&digest[digest.len() - ADDRESS_LENGTH..]);
        Address(arr)
    }

    pub fn from_slice(bytes: &[u8]) -> Self {
        let mut arr = [0u8; ADDRESS_LENGTH];
        let len = bytes.len().min(ADDRESS_LENGTH);
        arr[..len].copy_from_slice(&bytes[..len]);
        Address(arr)
    }

    pub fn to_hex(&self) -> String {
        format!("0x{}", hex::encode(self.0))
    }
}

impl From<[u8; ADDRESS_LENGTH]> for Address {
    fn from(bytes: [u8; ADDRESS_LENGTH]) -> Self {
        Address(bytes)
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({})", hex::encode(self.0))
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl FromStr for Address {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let digits = trimmed
            .strip_prefix("0x")
            .or_else(|| trimmed.strip_prefix("0X"))
            .unwrap_or(trimmed);
        let bytes = hex::decode(digits).map_err(|e| format!("invalid address {:?}: {}", s, e))?;
        if bytes.len() != ADDRESS_LENGTH {
            return Err(format!(
                "invalid address length: expected {} bytes, got {}",
                ADDRESS_LENGTH,
                bytes.len()
            ));
        }
        Ok(Address::from_slice(&bytes))
    }
}

impl Serialize for Address {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Token amount in base units (10^18 per token).
///
/// Backed by an arbitrary precision unsigned integer, so subtraction is the
/// only operation that can fail and it does so explicitly via [`Amount::checked_sub`].
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Amount(BigUint);

impl Amount {
    pub fn zero() -> Self {
        Amount(BigUint::zero())
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    /// `n` whole tokens.
    pub fn from_tokens(n: u64) -> Self {
        Amount(BigUint::from(n) * unit())
    }

    pub fn checked_sub(&self, other: &Amount) -> Option<Amount> {
        self.0.checked_sub(&other.0).map(Amount)
    }
}

fn unit() -> BigUint {
    BigUint::from(10u32).pow(DECIMALS as u32)
}

impl From<u64> for Amount {
    fn from(v: u64) -> Self {
        Amount(BigUint::from(v))
    }
}

impl From<u128> for Amount {
    fn from(v: u128) -> Self {
        Amount(BigUint::from(v))
    }
}

impl From<BigUint> for Amount {
    fn from(v: BigUint) -> Self {
        Amount(v)
    }
}

impl Add<&Amount> for &Amount {
    type Output = Amount;

    fn add(self, rhs: &Amount) -> Amount {
        Amount(&self.0 + &rhs.0)
    }
}

impl Add for Amount {
    type Output = Amount;

    fn add(self, rhs: Amount) -> Amount {
        Amount(self.0 + rhs.0)
    }
}

impl AddAssign<&Amount> for Amount {
    fn add_assign(&mut self, rhs: &Amount) {
        self.0 += &rhs.0;
    }
}

impl<'a> Sum<&'a Amount> for Amount {
    fn sum<I: Iterator<Item = &'a Amount>>(iter: I) -> Self {
        iter.fold(Amount::zero(), |acc, a| &acc + a)
    }
}

impl fmt::Debug for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Amount({})", self.0)
    }
}

/// Base units, not tokens. Use [`format_units`] for display to end users.
impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Amount {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.is_empty() || !trimmed.bytes().all(|b| b.is_ascii_digit()) {
            return Err(format!("invalid amount: {:?}", s));
        }
        BigUint::parse_bytes(trimmed.as_bytes(), 10)
            .map(Amount)
            .ok_or_else(|| format!("invalid amount: {:?}", s))
    }
}

impl Serialize for Amount {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.0.to_str_radix(10))
    }
}

impl<'de> Deserialize<'de> for Amount {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Parse a human token amount such as `"100"` or `"0.25"` into base units.
pub fn parse_units(s: &str) -> Result<Amount, String> {
    let trimmed = s.trim();
    let (whole, frac) = match trimmed.split_once('.') {
        Some((w, f)) => (w, f),
        None => (trimmed, ""),
    };

    if whole.is_empty() && frac.is_empty() {
        return Err(format!("invalid token amount: {:?}", s));
    }
    if !whole.bytes().chain(frac.bytes()).all(|b| b.is_ascii_digit()) {
        return Err(format!("invalid token amount: {:?}", s));
    }
    if frac.len() > DECIMALS as usize {
        return Err(format!(
            "too many fractional digits in {:?} (max {})",
            s, DECIMALS
        ));
    }

    let mut digits = String::with_capacity(whole.len() + DECIMALS as usize);
    digits.push_str(whole);
    digits.push_str(frac);
    digits.extend(std::iter::repeat('0').take(DECIMALS as usize - frac.len()));

    BigUint::parse_bytes(digits.as_bytes(), 10)
        .map(Amount)
        .ok_or_else(|| format!("invalid token amount: {:?}", s))
}

/// Render base units as a token amount, trimming trailing fractional zeros.
pub fn format_units(amount: &Amount) -> String {
    let decimals = DECIMALS as usize;
    let mut digits = amount.0.to_str_radix(10);
    if digits.len() <= decimals {
        let padding = decimals + 1 - digits.len();
        digits.insert_str(0, &"0".repeat(padding));
    }

    let (whole, frac) = digits.split_at(digits.len() - decimals);
    let frac = frac.trim_end_matches('0');
    if frac.is_empty() {
        whole.to_string()
    } else {
        format!("{}.{}", whole, frac)
    }
}
