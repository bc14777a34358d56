use aes::Aes256;
use async_trait::async_trait;
use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use cbc::cipher::{BlockDecryptMut, BlockEncryptMut, KeyIvInit, block_padding::Pkcs7};
use hmac::{Hmac, Mac};
use rand::RngCore;
use serde_json::Value;
use sha1::Sha1;
use sha2::Sha256;
use time::{Duration, OffsetDateTime};
use zeroize::Zeroizing;

use super::{SealEngine, SealError};
use crate::password::{PasswordMap, Secret};

const MAC_PREFIX: &str = "Fe26.2";
const SALT_BYTES: usize = 32;
const KEY_BYTES: usize = 32;
const IV_BYTES: usize = 16;
const PBKDF2_ITERATIONS: u32 = 1;

type Aes256CbcEnc = cbc::Encryptor<Aes256>;
type Aes256CbcDec = cbc::Decryptor<Aes256>;
type HmacSha256 = Hmac<Sha256>;

/// Seals in the iron `Fe26.2` format: AES-256-CBC for confidentiality, HMAC-SHA256 for
/// integrity, both keyed through PBKDF2 with a fresh salt per seal.
#[derive(Debug, Clone)]
pub struct IronSeal {
    timestamp_skew: Duration,
    localtime_offset: Duration,
}

impl Default for IronSeal {
    fn default() -> Self {
        Self {
            timestamp_skew: Duration::seconds(60),
            localtime_offset: Duration::ZERO,
        }
    }
}

impl IronSeal {
    /// Grace period applied when checking a seal's expiration.
    #[must_use]
    pub fn with_timestamp_skew(mut self, skew: Duration) -> Self {
        self.timestamp_skew = skew;
        self
    }

    /// Shifts this engine's notion of "now".
    #[must_use]
    pub fn with_localtime_offset(mut self, offset: Duration) -> Self {
        self.localtime_offset = offset;
        self
    }

    fn now_ms(&self) -> i64 {
        let now = OffsetDateTime::now_utc() + self.localtime_offset;
        (now.unix_timestamp_nanos() / 1_000_000) as i64
    }
}

fn random_salt() -> String {
    let mut salt = [0u8; SALT_BYTES];
    rand::rng().fill_bytes(&mut salt);
    hex::encode(salt)
}

fn derive_key(secret: &Secret, salt: &str) -> Zeroizing<[u8; KEY_BYTES]> {
    let mut key = Zeroizing::new([0u8; KEY_BYTES]);
    pbkdf2::pbkdf2_hmac::<Sha1>(
        secret.expose().as_bytes(),
        salt.as_bytes(),
        PBKDF2_ITERATIONS,
        &mut key[..],
    );
    key
}

fn mac(secret: &Secret, salt: &str, base: &str) -> Result<HmacSha256, SealError> {
    let key = derive_key(secret, salt);
    let mut mac = <HmacSha256 as Mac>::new_from_slice(&key[..]).map_err(|_| SealError::Key)?;
    mac.update(base.as_bytes());
    Ok(mac)
}

#[async_trait]
impl SealEngine for IronSeal {
    fn name(&self) -> &'static str {
        "iron"
    }

    async fn seal(
        &self,
        data: &Value,
        password_id: u32,
        secret: &Secret,
        ttl: Option<Duration>,
    ) -> Result<String, SealError> {
        let plaintext = Zeroizing::new(serde_json::to_vec(data)?);

        let encryption_salt = random_salt();
        let key = derive_key(secret, &encryption_salt);
        let mut iv = [0u8; IV_BYTES];
        rand::rng().fill_bytes(&mut iv);
        let encrypted = Aes256CbcEnc::new_from_slices(&key[..], &iv)
            .map_err(|_| SealError::Key)?
            .encrypt_padded_vec_mut::<Pkcs7>(&plaintext);

        let expiration = match ttl {
            Some(ttl) if ttl.is_positive() => {
                let ttl_ms = i64::try_from(ttl.whole_milliseconds()).unwrap_or(i64::MAX);
                self.now_ms().saturating_add(ttl_ms).to_string()
            }
            _ => String::new(),
        };

        let base = format!(
            "{MAC_PREFIX}*{password_id}*{encryption_salt}*{}*{}*{expiration}",
            URL_SAFE_NO_PAD.encode(iv),
            URL_SAFE_NO_PAD.encode(encrypted),
        );

        let hmac_salt = random_salt();
        let digest = mac(secret, &hmac_salt, &base)?.finalize().into_bytes();

        Ok(format!(
            "{base}*{hmac_salt}*{}",
            URL_SAFE_NO_PAD.encode(digest)
        ))
    }

    async fn unseal(
        &self,
        sealed: &str,
        passwords: &PasswordMap,
        _ttl: Option<Duration>,
    ) -> Result<Value, SealError> {
        let parts: Vec<&str> = sealed.split('*').collect();
        let &[
            prefix,
            password_id,
            encryption_salt,
            iv,
            encrypted,
            expiration,
            hmac_salt,
            hmac,
        ] = parts.as_slice()
        else {
            return Err(SealError::ComponentCount);
        };

        if prefix != MAC_PREFIX {
            return Err(SealError::WrongPrefix);
        }

        if !expiration.is_empty() {
            if !expiration.bytes().all(|b| b.is_ascii_digit()) {
                return Err(SealError::InvalidExpiration);
            }
            // All digits but too large for i64: far in the future, left to the hmac check.
            let expiration: i64 = expiration.parse().unwrap_or(i64::MAX);
            let skew_ms =
                i64::try_from(self.timestamp_skew.whole_milliseconds()).unwrap_or(i64::MAX);
            if expiration <= self.now_ms().saturating_sub(skew_ms) {
                return Err(SealError::Expired);
            }
        }

        let secret = password_id
            .parse::<u32>()
            .ok()
            .and_then(|id| passwords.get(id))
            .ok_or_else(|| {
                let id = if password_id.is_empty() {
                    "default"
                } else {
                    password_id
                };
                SealError::UnknownPassword(id.to_owned())
            })?;

        let base = parts[..6].join("*");
        let expected = URL_SAFE_NO_PAD
            .decode(hmac)
            .map_err(|_| SealError::BadHmac)?;
        mac(secret, hmac_salt, &base)?
            .verify_slice(&expected)
            .map_err(|_| SealError::BadHmac)?;

        let key = derive_key(secret, encryption_salt);
        let iv = URL_SAFE_NO_PAD.decode(iv)?;
        let encrypted = URL_SAFE_NO_PAD.decode(encrypted)?;
        let plaintext = Zeroizing::new(
            Aes256CbcDec::new_from_slices(&key[..], &iv)
                .map_err(|_| SealError::Key)?
                .decrypt_padded_vec_mut::<Pkcs7>(&encrypted)
                .map_err(|_| SealError::Decrypt)?,
        );

        Ok(serde_json::from_slice(&plaintext)?)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::password::Password;

    const A: &str = "a-secret-that-is-at-least-32-bytes-long";
    const B: &str = "b-secret-that-is-at-least-32-bytes-long";

    fn passwords(password: impl Into<Password>) -> PasswordMap {
        password.into().normalize().expect("passwords are valid")
    }

    async fn seal_with(engine: &IronSeal, map: &PasswordMap, ttl: Option<Duration>) -> String {
        let (id, secret) = map.current();
        engine
            .seal(&json!({ "user": "alice" }), id, secret, ttl)
            .await
            .expect("seal succeeds")
    }

    #[tokio::test]
    async fn seal_has_iron_shape() {
        let map = passwords(A);
        let sealed = seal_with(&IronSeal::default(), &map, Some(Duration::hours(1))).await;
        let parts: Vec<&str> = sealed.split('*').collect();

        assert_eq!(parts.len(), 8);
        assert_eq!(parts[0], "Fe26.2");
        assert_eq!(parts[1], "1");
        assert_eq!(parts[2].len(), 64);
        assert!(parts[5].parse::<i64>().is_ok());
        assert!(!sealed.contains('~'));
    }

    #[tokio::test]
    async fn roundtrip() {
        let map = passwords(A);
        let engine = IronSeal::default();
        let sealed = seal_with(&engine, &map, Some(Duration::hours(1))).await;

        let value = engine
            .unseal(&sealed, &map, None)
            .await
            .expect("unseal succeeds");

        assert_eq!(value, json!({ "user": "alice" }));
    }

    #[tokio::test]
    async fn no_ttl_leaves_expiration_empty() {
        let map = passwords(A);
        let engine = IronSeal::default();
        let sealed = seal_with(&engine, &map, None).await;

        assert_eq!(sealed.split('*').nth(5), Some(""));

        let later = IronSeal::default().with_localtime_offset(Duration::weeks(520));
        assert!(later.unseal(&sealed, &map, None).await.is_ok());
    }

    #[tokio::test]
    async fn expired_after_ttl_elapses() {
        let map = passwords(A);
        let engine = IronSeal::default().with_timestamp_skew(Duration::ZERO);
        let sealed = seal_with(&engine, &map, Some(Duration::milliseconds(1000))).await;

        let later = engine
            .clone()
            .with_localtime_offset(Duration::milliseconds(1001));
        let err = later
            .unseal(&sealed, &map, None)
            .await
            .expect_err("seal is expired");

        assert!(matches!(err, SealError::Expired));
    }

    #[tokio::test]
    async fn skew_tolerates_small_clock_drift() {
        let map = passwords(A);
        let engine = IronSeal::default();
        let sealed = seal_with(&engine, &map, Some(Duration::milliseconds(1000))).await;

        let later = IronSeal::default().with_localtime_offset(Duration::seconds(30));
        assert!(later.unseal(&sealed, &map, None).await.is_ok());
    }

    #[tokio::test]
    async fn unknown_password_id() {
        let engine = IronSeal::default();
        let sealed = seal_with(&engine, &passwords([(1, A), (2, B)]), None).await;

        let err = engine
            .unseal(&sealed, &passwords([(1, A)]), None)
            .await
            .expect_err("password 2 is not registered");

        assert!(matches!(err, SealError::UnknownPassword(ref id) if id == "2"));
        assert!(err.is_soft());
    }

    #[tokio::test]
    async fn wrong_secret_under_same_id_is_bad_hmac() {
        let engine = IronSeal::default();
        let sealed = seal_with(&engine, &passwords(A), None).await;

        let err = engine
            .unseal(&sealed, &passwords(B), None)
            .await
            .expect_err("secret does not match");

        assert!(matches!(err, SealError::BadHmac));
    }

    #[tokio::test]
    async fn tampered_ciphertext_is_bad_hmac() {
        let map = passwords(A);
        let engine = IronSeal::default();
        let sealed = seal_with(&engine, &map, None).await;

        let mut parts: Vec<String> = sealed.split('*').map(str::to_owned).collect();
        let flipped = if parts[4].starts_with('A') { "B" } else { "A" };
        parts[4].replace_range(0..1, flipped);
        let tampered = parts.join("*");

        let err = engine
            .unseal(&tampered, &map, None)
            .await
            .expect_err("tampered seal is rejected");

        assert!(matches!(err, SealError::BadHmac));
    }

    #[tokio::test]
    async fn malformed_input() {
        let map = passwords(A);
        let engine = IronSeal::default();

        let err = engine
            .unseal("bogus", &map, None)
            .await
            .expect_err("not a seal");
        assert!(matches!(err, SealError::ComponentCount));

        let err = engine
            .unseal("Fe26.1*1*a*b*c**d*e", &map, None)
            .await
            .expect_err("wrong prefix");
        assert!(matches!(err, SealError::WrongPrefix));
        assert!(!err.is_soft());

        let err = engine
            .unseal("Fe26.2*1*a*b*c*soon*d*e", &map, None)
            .await
            .expect_err("bad expiration");
        assert!(matches!(err, SealError::InvalidExpiration));
    }

    #[tokio::test]
    async fn oversized_expiration_is_a_bad_hmac() {
        let map = passwords(A);
        let engine = IronSeal::default();
        let sealed = seal_with(&engine, &map, Some(Duration::hours(1))).await;
        let mut parts: Vec<&str> = sealed.split('*').collect();
        parts[5] = "99999999999999999999999";

        let err = engine
            .unseal(&parts.join("*"), &map, None)
            .await
            .expect_err("tampered expiration is rejected");

        assert!(matches!(err, SealError::BadHmac));
        assert!(err.is_soft());
    }

    #[tokio::test]
    async fn huge_ttl_saturates() {
        let map = passwords(A);
        let engine = IronSeal::default();
        let sealed = seal_with(&engine, &map, Some(Duration::MAX)).await;

        assert_eq!(sealed.split('*').nth(5), Some(i64::MAX.to_string().as_str()));
        let value = engine
            .unseal(&sealed, &map, None)
            .await
            .expect("unseal succeeds");
        assert_eq!(value, json!({ "user": "alice" }));
    }
}
