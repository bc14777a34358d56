use std::{collections::BTreeMap, fmt};

use zeroize::Zeroizing;

use crate::error::{Error, Result};

/// Minimum length, in bytes, of every registered secret.
pub const MIN_PASSWORD_BYTES: usize = 32;

/// A secret used to seal and unseal session cookies. The value is wiped on drop and never
/// shows up in `Debug` output.
#[derive(Clone)]
pub struct Secret(Zeroizing<String>);

impl Secret {
    pub fn expose(&self) -> &str {
        self.0.as_str()
    }
}

impl From<String> for Secret {
    fn from(value: String) -> Self {
        Self(Zeroizing::new(value))
    }
}

impl From<&str> for Secret {
    fn from(value: &str) -> Self {
        Self::from(value.to_owned())
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Secret(..)")
    }
}

/// Password input as accepted by configuration: one secret, or a map of rotation ids to secrets.
#[derive(Clone)]
pub enum Password {
    Single(Secret),
    Map(BTreeMap<u32, Secret>),
}

impl Password {
    /// Normalizes the input into a validated [`PasswordMap`]. A single secret is registered
    /// under id `1`.
    pub fn normalize(&self) -> Result<PasswordMap> {
        let secrets = match self {
            Self::Single(secret) => BTreeMap::from([(1, secret.clone())]),
            Self::Map(secrets) => secrets.clone(),
        };
        PasswordMap::new(secrets)
    }
}

impl fmt::Debug for Password {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Single(_) => f.write_str("Password::Single(..)"),
            Self::Map(secrets) => f
                .debug_tuple("Password::Map")
                .field(&secrets.keys().collect::<Vec<_>>())
                .finish(),
        }
    }
}

impl From<&str> for Password {
    fn from(value: &str) -> Self {
        Self::Single(value.into())
    }
}

impl From<String> for Password {
    fn from(value: String) -> Self {
        Self::Single(value.into())
    }
}

impl<S: Into<Secret>> From<BTreeMap<u32, S>> for Password {
    fn from(value: BTreeMap<u32, S>) -> Self {
        Self::Map(value.into_iter().map(|(id, s)| (id, s.into())).collect())
    }
}

impl<S: Into<Secret>, const N: usize> From<[(u32, S); N]> for Password {
    fn from(value: [(u32, S); N]) -> Self {
        Self::Map(value.into_iter().map(|(id, s)| (id, s.into())).collect())
    }
}

impl<S: Into<Secret>> From<Vec<(u32, S)>> for Password {
    fn from(value: Vec<(u32, S)>) -> Self {
        Self::Map(value.into_iter().map(|(id, s)| (id, s.into())).collect())
    }
}

/// Validated, non-empty rotation map. New seals always use the highest id; unsealing may use
/// any registered id.
#[derive(Clone)]
pub struct PasswordMap {
    secrets: BTreeMap<u32, Secret>,
    current: u32,
}

impl PasswordMap {
    pub fn new(secrets: BTreeMap<u32, Secret>) -> Result<Self> {
        for (id, secret) in &secrets {
            if *id == 0 {
                return Err(Error::configuration("password ids must be positive integers"));
            }
            let len = secret.expose().len();
            if len < MIN_PASSWORD_BYTES {
                return Err(Error::configuration(format!(
                    "password {id} must be at least {MIN_PASSWORD_BYTES} bytes long, got {len}"
                )));
            }
        }

        let current = secrets
            .keys()
            .next_back()
            .copied()
            .ok_or_else(|| Error::configuration("at least one password is required"))?;

        Ok(Self { secrets, current })
    }

    /// The id and secret used for every new seal.
    pub fn current(&self) -> (u32, &Secret) {
        (self.current, &self.secrets[&self.current])
    }

    pub fn get(&self, id: u32) -> Option<&Secret> {
        self.secrets.get(&id)
    }

    pub fn ids(&self) -> impl Iterator<Item = u32> + '_ {
        self.secrets.keys().copied()
    }

}

impl fmt::Debug for PasswordMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PasswordMap")
            .field("ids", &self.secrets.keys().collect::<Vec<_>>())
            .field("current", &self.current)
            .finish()
    }
}
