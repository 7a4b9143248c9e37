//! Signup, OTP verification, sign-in and password reset.
//!
//! Every flow is a short sequence of store calls. One-time codes are stored
//! only as bcrypt hashes and are removed once used or found expired.

use chrono::{Duration, Utc};
use tracing::{info, warn};
use uuid::Uuid;

use crate::auth::google::ExternalProfile;
use crate::auth::otp::generate_otp;
use crate::auth::JwtKeys;
use crate::mail::{Mailer, OutgoingMail};
use crate::models::{Credential, NewOtpRecord, NewUser, OtpPurpose, Role, User, UserSummary};
use crate::state::AuthSettings;
use crate::store::{Store, StoreError};
use crate::utils::error::AppError;
use crate::utils::validation::{
    is_long_enough, is_valid_email, is_valid_name, normalize_email, parse_date, parse_id,
};

const INVALID_CREDENTIALS: &str = "Invalid credentials entered";
const NO_PENDING_CODE: &str =
    "Account record doesn't exist or has been verified already. Please sign up or log in.";
const NO_ACCOUNT_FOR_EMAIL: &str = "There is no account for the provided email.";

#[derive(Debug, Default, Clone)]
pub struct SignupInput {
    pub name: String,
    pub email: String,
    pub password: String,
    pub date_of_birth: String,
    pub role: Option<String>,
    pub admin_secret: Option<String>,
}

/// A signed-in (or freshly signed-up) user and their session token.
#[derive(Debug, Clone)]
pub struct AuthOutcome {
    pub token: String,
    pub user: UserSummary,
}

pub struct AuthService<'a> {
    store: &'a dyn Store,
    mailer: &'a dyn Mailer,
    tokens: &'a JwtKeys,
    settings: &'a AuthSettings,
}

impl<'a> AuthService<'a> {
    pub fn new(
        store: &'a dyn Store,
        mailer: &'a dyn Mailer,
        tokens: &'a JwtKeys,
        settings: &'a AuthSettings,
    ) -> Self {
        Self {
            store,
            mailer,
            tokens,
            settings,
        }
    }

    pub async fn signup(&self, input: SignupInput) -> Result<AuthOutcome, AppError> {
        let name = input.name.trim();
        let email = normalize_email(&input.email);
        let password = input.password.trim();
        let date_of_birth = input.date_of_birth.trim();

        if name.is_empty() || email.is_empty() || password.is_empty() || date_of_birth.is_empty()
        {
            return Err(AppError::ValidationError("Empty input fields!".into()));
        }
        if !is_valid_name(name) {
            return Err(AppError::ValidationError("Invalid name".into()));
        }
        if !is_valid_email(&email) {
            return Err(AppError::ValidationError("Invalid email entered".into()));
        }
        let date_of_birth = parse_date(date_of_birth)
            .ok_or_else(|| AppError::ValidationError("Invalid date of birth entered".into()))?;
        if !is_long_enough(password) {
            return Err(AppError::ValidationError("Password is too short!".into()));
        }

        if self.store.find_user_by_email(&email).await?.is_some() {
            return Err(AppError::Conflict("Email already exists!".into()));
        }

        let role = self.resolve_role(input.role.as_deref(), input.admin_secret.as_deref())?;
        let password_hash = self.settings.hasher.hash(password).await?;

        let user = self
            .store
            .insert_user(NewUser {
                name: name.to_string(),
                email,
                role,
                verified: false,
                credential: Credential::Local {
                    password_hash,
                    date_of_birth,
                },
            })
            .await
            .map_err(|err| match err {
                StoreError::Conflict(_) => AppError::Conflict("Email already exists!".into()),
                other => other.into(),
            })?;
        info!(user_id = %user.id, role = %user.role, "user signed up");

        // The account stays unverified if delivery fails; the resend endpoint recovers it.
        self.send_code(&user, OtpPurpose::Verification).await?;

        self.outcome(&user)
    }

    pub async fn verify_otp(&self, user_id: &str, otp: &str) -> Result<AuthOutcome, AppError> {
        let otp = otp.trim();
        if user_id.trim().is_empty() || otp.is_empty() {
            return Err(AppError::ValidationError(
                "Empty otp details are not allowed".into(),
            ));
        }
        let user_id = parse_id(user_id, "user id")?;

        self.check_code(user_id, OtpPurpose::Verification, otp)
            .await?;

        let mut user = self
            .store
            .find_user_by_id(user_id)
            .await?
            .ok_or_else(|| AppError::NotFound(NO_PENDING_CODE.into()))?;
        self.store.mark_user_verified(user_id).await?;
        self.store
            .delete_otps(user_id, OtpPurpose::Verification)
            .await?;
        user.verified = true;
        info!(user_id = %user.id, "email verified");

        self.outcome(&user)
    }

    pub async fn resend_verification(&self, user_id: &str, email: &str) -> Result<(), AppError> {
        if user_id.trim().is_empty() || email.trim().is_empty() {
            return Err(AppError::ValidationError(
                "Empty user details are not allowed".into(),
            ));
        }
        let user_id = parse_id(user_id, "user id")?;

        let user = self
            .store
            .find_user_by_id(user_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Account not found".into()))?;
        if user.email != normalize_email(email) {
            return Err(AppError::ValidationError(
                "Email does not match the account".into(),
            ));
        }

        self.send_code(&user, OtpPurpose::Verification).await
    }

    /// Unknown emails, external accounts and wrong passwords fail identically.
    pub async fn signin(&self, email: &str, password: &str) -> Result<AuthOutcome, AppError> {
        let email = normalize_email(email);
        let password = password.trim();
        if email.is_empty() || password.is_empty() {
            return Err(AppError::ValidationError(
                "Empty credentials supplied".into(),
            ));
        }

        let invalid = || AppError::AuthError(INVALID_CREDENTIALS.into());
        let user = self
            .store
            .find_user_by_email(&email)
            .await?
            .ok_or_else(invalid)?;
        let hash = user.password_hash().ok_or_else(invalid)?;
        if !self.settings.hasher.verify(password, hash).await? {
            return Err(invalid());
        }

        info!(user_id = %user.id, "user signed in");
        self.outcome(&user)
    }

    pub async fn request_password_reset(&self, email: &str) -> Result<(), AppError> {
        let email = normalize_email(email);
        if email.is_empty() {
            return Err(AppError::ValidationError("An email is required".into()));
        }

        let user = self
            .store
            .find_user_by_email(&email)
            .await?
            .ok_or_else(|| AppError::NotFound(NO_ACCOUNT_FOR_EMAIL.into()))?;
        if !user.verified {
            return Err(AppError::ValidationError(
                "Email hasn't been verified yet. Check your inbox.".into(),
            ));
        }
        ensure_local(&user)?;

        self.send_code(&user, OtpPurpose::PasswordReset).await
    }

    pub async fn reset_password(
        &self,
        email: &str,
        otp: &str,
        new_password: &str,
    ) -> Result<(), AppError> {
        let email = normalize_email(email);
        let otp = otp.trim();
        let new_password = new_password.trim();
        if email.is_empty() || otp.is_empty() || new_password.is_empty() {
            return Err(AppError::ValidationError(
                "Empty password reset details are not allowed".into(),
            ));
        }
        if !is_long_enough(new_password) {
            return Err(AppError::ValidationError("Password is too short!".into()));
        }

        let user = self
            .store
            .find_user_by_email(&email)
            .await?
            .ok_or_else(|| AppError::NotFound(NO_ACCOUNT_FOR_EMAIL.into()))?;
        ensure_local(&user)?;

        self.check_code(user.id, OtpPurpose::PasswordReset, otp)
            .await?;

        let password_hash = self.settings.hasher.hash(new_password).await?;
        self.store
            .update_password_hash(user.id, &password_hash)
            .await?;
        self.store
            .delete_otps(user.id, OtpPurpose::PasswordReset)
            .await?;
        info!(user_id = %user.id, "password reset");
        Ok(())
    }

    /// Signs in a user vouched for by an external provider, creating the account on first visit.
    pub async fn sign_in_external(
        &self,
        profile: ExternalProfile,
    ) -> Result<AuthOutcome, AppError> {
        if let Some(user) = self.store.find_user_by_google_id(&profile.subject).await? {
            return self.outcome(&user);
        }

        let email = normalize_email(&profile.email);
        if self.store.find_user_by_email(&email).await?.is_some() {
            return Err(AppError::Conflict(
                "An account with this email already exists. Sign in with your password.".into(),
            ));
        }

        let user = self
            .store
            .insert_user(NewUser {
                name: profile.name,
                email,
                role: Role::Attendee,
                verified: true,
                credential: Credential::External {
                    google_id: profile.subject,
                },
            })
            .await?;
        info!(user_id = %user.id, "user created from external identity");

        self.outcome(&user)
    }

    fn resolve_role(
        &self,
        requested: Option<&str>,
        admin_secret: Option<&str>,
    ) -> Result<Role, AppError> {
        let role = Role::from_signup(requested);
        if role == Role::Admin {
            let expected = self.settings.admin_secret.as_deref();
            if expected.is_none() || expected != admin_secret {
                warn!("admin signup attempted with an invalid secret");
                return Err(AppError::Forbidden("Invalid admin secret key!".into()));
            }
        }
        Ok(role)
    }

    /// Replaces any pending code of this purpose with a fresh one and mails it.
    async fn send_code(&self, user: &User, purpose: OtpPurpose) -> Result<(), AppError> {
        self.store.delete_otps(user.id, purpose).await?;

        let code = generate_otp();
        let otp_hash = self.settings.hasher.hash(&code).await?;
        let now = Utc::now();
        self.store
            .insert_otp(NewOtpRecord {
                user_id: user.id,
                purpose,
                otp_hash,
                created_at: now,
                expires_at: now + self.settings.otp_ttl,
            })
            .await?;

        self.mailer
            .send(code_mail(&user.email, &code, purpose, self.settings.otp_ttl))
            .await?;
        info!(user_id = %user.id, purpose = %purpose, "one-time code sent");
        Ok(())
    }

    /// Checks `code` against the latest stored hash. Expired codes are deleted.
    async fn check_code(
        &self,
        user_id: Uuid,
        purpose: OtpPurpose,
        code: &str,
    ) -> Result<(), AppError> {
        let record = self
            .store
            .find_latest_otp(user_id, purpose)
            .await?
            .ok_or_else(|| AppError::NotFound(NO_PENDING_CODE.into()))?;

        if record.is_expired(Utc::now()) {
            self.store.delete_otps(user_id, purpose).await?;
            return Err(AppError::Expired(
                "Code has expired. Please request again.".into(),
            ));
        }

        if !self.settings.hasher.verify(code, &record.otp_hash).await? {
            return Err(AppError::ValidationError(
                "Invalid code passed. Check your inbox.".into(),
            ));
        }
        Ok(())
    }

    fn outcome(&self, user: &User) -> Result<AuthOutcome, AppError> {
        let token = self
            .tokens
            .issue(user.id, user.role)
            .map_err(|e| AppError::InternalServerError(e.to_string()))?;
        Ok(AuthOutcome {
            token,
            user: user.summary(),
        })
    }
}

fn ensure_local(user: &User) -> Result<(), AppError> {
    match user.credential {
        Credential::Local { .. } => Ok(()),
        Credential::External { .. } => Err(AppError::ValidationError(
            "This account signs in with Google and has no password".into(),
        )),
    }
}

fn code_mail(to: &str, code: &str, purpose: OtpPurpose, ttl: Duration) -> OutgoingMail {
    let (subject, action) = match purpose {
        OtpPurpose::Verification => (
            "Verify Your Email",
            "Enter the code below in the app to verify your email address.",
        ),
        OtpPurpose::PasswordReset => (
            "Password Reset",
            "Enter the code below to reset your password.",
        ),
    };
    let minutes = ttl.num_minutes();
    OutgoingMail {
        to: to.to_string(),
        subject: subject.to_string(),
        text: format!("{action}\n\n{code}\n\nThis code expires in {minutes} minutes."),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::Hasher;
    use crate::mail::RecordingMailer;
    use crate::store::{MemoryStore, UserStore};
    use rstest::rstest;

    struct Harness {
        store: MemoryStore,
        mailer: RecordingMailer,
        tokens: JwtKeys,
        settings: AuthSettings,
    }

    impl Harness {
        fn new() -> Self {
            Self {
                store: MemoryStore::new(),
                mailer: RecordingMailer::new(),
                tokens: JwtKeys::new(b"test-secret", Duration::hours(1)),
                settings: AuthSettings {
                    admin_secret: Some("bootstrap".to_string()),
                    hasher: Hasher::new(4),
                    ..AuthSettings::default()
                },
            }
        }

        fn service(&self) -> AuthService<'_> {
            AuthService::new(&self.store, &self.mailer, &self.tokens, &self.settings)
        }
    }

    fn ann() -> SignupInput {
        SignupInput {
            name: "Ann".into(),
            email: "ann@x.com".into(),
            password: "longenough".into(),
            date_of_birth: "1990-01-01".into(),
            ..SignupInput::default()
        }
    }

    #[tokio::test]
    async fn signup_then_verify_marks_user_verified_once() {
        let h = Harness::new();
        let signed_up = h.service().signup(ann()).await.unwrap();
        assert!(!signed_up.user.verified);
        assert_eq!(signed_up.user.role, Role::Attendee);

        let code = h.mailer.last_code_for("ann@x.com").unwrap();
        let user_id = signed_up.user.id.to_string();
        let verified = h.service().verify_otp(&user_id, &code).await.unwrap();
        assert!(verified.user.verified);
        assert_eq!(h.tokens.verify(&verified.token).unwrap().user_id, signed_up.user.id);
        assert_eq!(h.store.otp_count(signed_up.user.id), 0);

        let again = h.service().verify_otp(&user_id, &code).await.unwrap_err();
        assert!(matches!(again, AppError::NotFound(_)));
    }

    #[rstest]
    #[case(SignupInput { password: "short".into(), ..ann() }, "Password is too short!")]
    #[case(SignupInput { name: "R2D2".into(), ..ann() }, "Invalid name")]
    #[case(SignupInput { email: "ann@x".into(), ..ann() }, "Invalid email entered")]
    #[case(SignupInput { date_of_birth: "someday".into(), ..ann() }, "Invalid date of birth entered")]
    #[case(SignupInput { name: "   ".into(), ..ann() }, "Empty input fields!")]
    #[tokio::test]
    async fn invalid_signups_create_nothing(#[case] input: SignupInput, #[case] message: &str) {
        let h = Harness::new();
        let err = h.service().signup(input).await.unwrap_err();
        assert!(matches!(&err, AppError::ValidationError(m) if m == message), "{err:?}");
        assert_eq!(h.store.user_count(), 0);
        assert!(h.mailer.sent().is_empty());
    }

    #[tokio::test]
    async fn duplicate_email_is_rejected() {
        let h = Harness::new();
        h.service().signup(ann()).await.unwrap();
        let err = h
            .service()
            .signup(SignupInput {
                email: " ANN@x.com ".into(),
                ..ann()
            })
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
        assert_eq!(h.store.user_count(), 1);
    }

    #[tokio::test]
    async fn admin_signup_requires_the_bootstrap_secret() {
        let h = Harness::new();
        let err = h
            .service()
            .signup(SignupInput {
                role: Some("admin".into()),
                admin_secret: Some("guess".into()),
                ..ann()
            })
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Forbidden(_)));

        let admin = h
            .service()
            .signup(SignupInput {
                role: Some("admin".into()),
                admin_secret: Some("bootstrap".into()),
                ..ann()
            })
            .await
            .unwrap();
        assert_eq!(admin.user.role, Role::Admin);
    }

    #[tokio::test]
    async fn expired_code_fails_and_is_removed() {
        let h = Harness::new();
        let user = h.service().signup(ann()).await.unwrap().user;
        let code = h.mailer.last_code_for("ann@x.com").unwrap();
        h.store.expire_otps(user.id);

        let err = h
            .service()
            .verify_otp(&user.id.to_string(), &code)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Expired(_)));
        assert_eq!(h.store.otp_count(user.id), 0);
    }

    #[tokio::test]
    async fn wrong_code_keeps_the_record() {
        let h = Harness::new();
        let user = h.service().signup(ann()).await.unwrap().user;
        let code = h.mailer.last_code_for("ann@x.com").unwrap();
        let wrong = if code == "1234" { "4321" } else { "1234" };

        let err = h
            .service()
            .verify_otp(&user.id.to_string(), wrong)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::ValidationError(_)));
        assert_eq!(h.store.otp_count(user.id), 1);
    }

    #[tokio::test]
    async fn resend_replaces_the_pending_code() {
        let h = Harness::new();
        let user = h.service().signup(ann()).await.unwrap().user;
        h.service()
            .resend_verification(&user.id.to_string(), "ann@x.com")
            .await
            .unwrap();
        assert_eq!(h.store.otp_count(user.id), 1);
        assert_eq!(h.mailer.sent().len(), 2);

        let err = h
            .service()
            .resend_verification(&user.id.to_string(), "eve@x.com")
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::ValidationError(_)));
    }

    #[tokio::test]
    async fn failed_delivery_leaves_an_unverified_user() {
        let h = Harness::new();
        h.mailer.fail_deliveries(true);
        let err = h.service().signup(ann()).await.unwrap_err();
        assert!(matches!(err, AppError::MailError(_)));

        let user = h.store.find_user_by_email("ann@x.com").await.unwrap().unwrap();
        assert!(!user.verified);

        h.mailer.fail_deliveries(false);
        h.service()
            .resend_verification(&user.id.to_string(), "ann@x.com")
            .await
            .unwrap();
        assert!(h.mailer.last_code_for("ann@x.com").is_some());
    }

    #[tokio::test]
    async fn signin_failures_are_indistinguishable() {
        let h = Harness::new();
        h.service().signup(ann()).await.unwrap();

        let wrong_password = h
            .service()
            .signin("ann@x.com", "not-the-password")
            .await
            .unwrap_err();
        let unknown_email = h
            .service()
            .signin("nobody@x.com", "longenough")
            .await
            .unwrap_err();
        assert_eq!(wrong_password.to_string(), unknown_email.to_string());
        assert!(matches!(wrong_password, AppError::AuthError(_)));

        let ok = h.service().signin("Ann@X.com", "longenough").await.unwrap();
        assert_eq!(h.tokens.verify(&ok.token).unwrap().role, Role::Attendee);
    }

    #[tokio::test]
    async fn password_reset_requires_verified_email() {
        let h = Harness::new();
        h.service().signup(ann()).await.unwrap();
        let err = h
            .service()
            .request_password_reset("ann@x.com")
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::ValidationError(_)));

        let err = h
            .service()
            .request_password_reset("nobody@x.com")
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn password_reset_replaces_the_password() {
        let h = Harness::new();
        let user = h.service().signup(ann()).await.unwrap().user;
        let code = h.mailer.last_code_for("ann@x.com").unwrap();
        h.service()
            .verify_otp(&user.id.to_string(), &code)
            .await
            .unwrap();

        h.service().request_password_reset("ann@x.com").await.unwrap();
        let reset_code = h.mailer.last_code_for("ann@x.com").unwrap();
        assert_eq!(h.mailer.sent().last().unwrap().subject, "Password Reset");

        h.service()
            .reset_password("ann@x.com", &reset_code, "brand-new-secret")
            .await
            .unwrap();
        assert!(h.service().signin("ann@x.com", "longenough").await.is_err());
        assert!(h
            .service()
            .signin("ann@x.com", "brand-new-secret")
            .await
            .is_ok());

        let reused = h
            .service()
            .reset_password("ann@x.com", &reset_code, "another-secret")
            .await
            .unwrap_err();
        assert!(matches!(reused, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn verification_codes_do_not_reset_passwords() {
        let h = Harness::new();
        let user = h.service().signup(ann()).await.unwrap().user;
        let code = h.mailer.last_code_for("ann@x.com").unwrap();
        h.store.mark_user_verified(user.id).await.unwrap();

        let err = h
            .service()
            .reset_password("ann@x.com", &code, "brand-new-secret")
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn external_sign_in_creates_then_reuses_the_account() {
        let h = Harness::new();
        let profile = ExternalProfile {
            subject: "google-42".into(),
            email: "Bo@x.com".into(),
            name: "Bo".into(),
        };

        let first = h.service().sign_in_external(profile.clone()).await.unwrap();
        assert!(first.user.verified);
        assert_eq!(first.user.email, "bo@x.com");
        let second = h.service().sign_in_external(profile).await.unwrap();
        assert_eq!(first.user.id, second.user.id);
        assert_eq!(h.store.user_count(), 1);

        let err = h.service().signin("bo@x.com", "anything-at-all").await.unwrap_err();
        assert!(matches!(err, AppError::AuthError(_)));
    }

    #[tokio::test]
    async fn external_sign_in_does_not_take_over_local_accounts() {
        let h = Harness::new();
        h.service().signup(ann()).await.unwrap();
        let err = h
            .service()
            .sign_in_external(ExternalProfile {
                subject: "google-1".into(),
                email: "ann@x.com".into(),
                name: "Ann".into(),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
    }
}
