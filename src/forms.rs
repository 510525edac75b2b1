use std::collections::BTreeMap;

use axum::extract::Multipart;
use chrono::{FixedOffset, NaiveDateTime, TimeZone};
use log::error;
use serde::{Deserialize, Serialize};

use crate::errors::MultipartError;
use crate::media_util::UploadedImage;
use crate::models::{Category, Location, User};

pub const NON_FIELD: &str = "non_field";

const REQUIRED: &str = "This field is required.";
const INVALID_CHOICE: &str = "Select a valid choice. That choice is not one of the available choices.";
const TITLE_MAX: usize = 256;
const NAME_MAX: usize = 150;
const PASSWORD_MIN: usize = 8;
const PUB_DATE_INPUT_FORMAT: &str = "%Y-%m-%dT%H:%M";
const PUB_DATE_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%d %H:%M:%S",
];

/// Field errors collected while validating a submission, in the order they
/// were found.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FormErrors(Vec<(String, String)>);

impl FormErrors {
    pub fn new() -> Self {
        Self(vec![])
    }

    pub fn add(&mut self, field: &str, message: impl Into<String>) {
        self.0.push((field.to_string(), message.into()));
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn has(&self, field: &str) -> bool {
        self.0.iter().any(|(f, _)| f == field)
    }

    pub fn for_field<'a>(&'a self, field: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.0
            .iter()
            .filter(move |(f, _)| f == field)
            .map(|(_, m)| m.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = &(String, String)> {
        self.0.iter()
    }

    fn into_result<T>(self, value: T) -> Result<T, FormErrors> {
        if self.is_empty() {
            Ok(value)
        } else {
            Err(self)
        }
    }
}

/// What the templates get for a form: the submitted values and the errors per
/// field. Every declared field has an entry in both maps.
#[derive(Clone, Debug, Serialize)]
pub struct FormState {
    pub values: BTreeMap<String, String>,
    pub errors: BTreeMap<String, Vec<String>>,
}

impl FormState {
    pub fn new<'a, I>(fields: &[&str], values: I) -> Self
    where
        I: IntoIterator<Item = (&'a str, String)>,
    {
        let mut state = FormState {
            values: fields.iter().map(|f| (f.to_string(), String::new())).collect(),
            errors: fields
                .iter()
                .chain(std::iter::once(&NON_FIELD))
                .map(|f| (f.to_string(), vec![]))
                .collect(),
        };
        for (field, value) in values {
            state.values.insert(field.to_string(), value);
        }
        state
    }

    pub fn with_errors(mut self, errors: &FormErrors) -> Self {
        for (field, message) in errors.iter() {
            self.errors
                .entry(field.clone())
                .or_default()
                .push(message.clone());
        }
        self
    }
}

fn check_required(errors: &mut FormErrors, field: &str, value: &str) -> bool {
    if value.trim().is_empty() {
        errors.add(field, REQUIRED);
        false
    } else {
        true
    }
}

fn check_max_len(errors: &mut FormErrors, field: &str, value: &str, max: usize) {
    let len = value.chars().count();
    if len > max {
        errors.add(
            field,
            format!(
                "Ensure this value has at most {} characters (it has {}).",
                max, len
            ),
        );
    }
}

fn check_username(errors: &mut FormErrors, username: &str, taken: bool) {
    if !check_required(errors, "username", username) {
        return;
    }
    check_max_len(errors, "username", username, NAME_MAX);
    if !username
        .chars()
        .all(|c| c.is_alphanumeric() || "@.+-_".contains(c))
    {
        errors.add(
            "username",
            "Enter a valid username. This value may contain only letters, numbers, and @/./+/-/_ characters.",
        );
    } else if taken {
        errors.add("username", "A user with that username already exists.");
    }
}

fn check_email(errors: &mut FormErrors, email: &str) {
    if email.is_empty() {
        return;
    }
    let valid = match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.contains('@')
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
                && !email.chars().any(char::is_whitespace)
        }
        None => false,
    };
    if !valid {
        errors.add("email", "Enter a valid email address.");
    }
}

/// Parses a `datetime-local` style value given in the site's timezone and
/// returns it as naive UTC.
pub fn parse_local_datetime(raw: &str, offset: &FixedOffset) -> Option<NaiveDateTime> {
    let raw = raw.trim();
    PUB_DATE_FORMATS
        .iter()
        .find_map(|f| NaiveDateTime::parse_from_str(raw, f).ok())
        .and_then(|naive| offset.from_local_datetime(&naive).single())
        .map(|local| local.naive_utc())
}

/// Formats naive UTC as a `datetime-local` input value in the site's timezone.
pub fn format_local_datetime(utc: &NaiveDateTime, offset: &FixedOffset) -> String {
    offset
        .from_utc_datetime(utc)
        .format(PUB_DATE_INPUT_FORMAT)
        .to_string()
}

fn parse_choice<T, F>(
    errors: &mut FormErrors,
    field: &str,
    raw: &str,
    choices: &[T],
    id_of: F,
) -> Option<i32>
where
    F: Fn(&T) -> i32,
{
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    match raw.parse::<i32>() {
        Ok(id) if choices.iter().any(|c| id_of(c) == id) => Some(id),
        _ => {
            errors.add(field, INVALID_CHOICE);
            None
        }
    }
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct CommentForm {
    #[serde(default)]
    pub text: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ValidComment {
    pub text: String,
}

impl CommentForm {
    pub const FIELDS: &'static [&'static str] = &["text"];

    pub fn validate(&self) -> Result<ValidComment, FormErrors> {
        let mut errors = FormErrors::new();
        check_required(&mut errors, "text", &self.text);
        errors.into_result(ValidComment {
            text: self.text.trim().to_string(),
        })
    }

    pub fn state(&self) -> FormState {
        FormState::new(Self::FIELDS, [("text", self.text.clone())])
    }

    pub fn blank() -> FormState {
        FormState::new(Self::FIELDS, std::iter::empty())
    }
}

#[derive(Debug)]
pub enum ImageChange {
    Keep,
    Clear,
    Replace { image: UploadedImage, format: String },
}

#[derive(Debug)]
pub struct ValidPost {
    pub title: String,
    pub text: String,
    pub pub_date: NaiveDateTime,
    pub location_id: Option<i32>,
    pub category_id: Option<i32>,
    pub is_published: bool,
    pub image: ImageChange,
}

#[derive(Clone, Debug, Default)]
pub struct PostForm {
    pub title: String,
    pub text: String,
    pub pub_date: String,
    pub location: String,
    pub category: String,
    pub is_published: bool,
    pub image_clear: bool,
    pub image: Option<UploadedImage>,
}

fn checkbox(value: &str) -> bool {
    matches!(value.trim(), "on" | "true" | "1" | "yes")
}

impl PostForm {
    pub const FIELDS: &'static [&'static str] = &[
        "title",
        "text",
        "pub_date",
        "location",
        "category",
        "is_published",
        "image",
    ];

    /// Reads a `multipart/form-data` post submission.
    pub async fn from_multipart(mut multipart: Multipart) -> Result<Self, MultipartError> {
        let mut form = PostForm::default();
        while let Some(field) = multipart.next_field().await.map_err(|e| {
            error!("malformed multipart body: {:?}", e);
            MultipartError
        })? {
            let name = field.name().unwrap_or_default().to_string();
            if name == "image" {
                let file_name = field.file_name().map(str::to_string);
                let content_type = field.content_type().map(str::to_string);
                let data = field.bytes().await.map_err(|e| {
                    error!("could not read image field: {:?}", e);
                    MultipartError
                })?;
                form.image = Some(UploadedImage {
                    file_name,
                    content_type,
                    data,
                });
                continue;
            }

            let value = field.text().await.map_err(|e| {
                error!("could not read field {:?}: {:?}", name, e);
                MultipartError
            })?;
            match name.as_str() {
                "title" => form.title = value,
                "text" => form.text = value,
                "pub_date" => form.pub_date = value,
                "location" => form.location = value,
                "category" => form.category = value,
                "is_published" => form.is_published = checkbox(&value),
                "image-clear" => form.image_clear = checkbox(&value),
                _ => {}
            }
        }
        Ok(form)
    }

    /// Empty form for a new post: published, dated now.
    pub fn initial(now: &NaiveDateTime, offset: &FixedOffset) -> FormState {
        FormState::new(
            Self::FIELDS,
            [
                ("pub_date", format_local_datetime(now, offset)),
                ("is_published", "on".to_string()),
            ],
        )
    }

    pub fn instance(post: &crate::models::Post, offset: &FixedOffset) -> FormState {
        FormState::new(
            Self::FIELDS,
            [
                ("title", post.title.clone()),
                ("text", post.text.clone()),
                ("pub_date", format_local_datetime(&post.pub_date, offset)),
                (
                    "location",
                    post.location_id.map(|id| id.to_string()).unwrap_or_default(),
                ),
                (
                    "category",
                    post.category_id.map(|id| id.to_string()).unwrap_or_default(),
                ),
                (
                    "is_published",
                    if post.is_published { "on" } else { "" }.to_string(),
                ),
                ("image", post.image.clone().unwrap_or_default()),
            ],
        )
    }

    pub fn state(&self) -> FormState {
        FormState::new(
            Self::FIELDS,
            [
                ("title", self.title.clone()),
                ("text", self.text.clone()),
                ("pub_date", self.pub_date.clone()),
                ("location", self.location.clone()),
                ("category", self.category.clone()),
                (
                    "is_published",
                    if self.is_published { "on" } else { "" }.to_string(),
                ),
            ],
        )
    }

    pub fn validate(
        self,
        categories: &[Category],
        locations: &[Location],
        offset: &FixedOffset,
    ) -> Result<ValidPost, FormErrors> {
        let mut errors = FormErrors::new();

        if check_required(&mut errors, "title", &self.title) {
            check_max_len(&mut errors, "title", self.title.trim(), TITLE_MAX);
        }
        check_required(&mut errors, "text", &self.text);

        let mut pub_date = None;
        if check_required(&mut errors, "pub_date", &self.pub_date) {
            pub_date = parse_local_datetime(&self.pub_date, offset);
            if pub_date.is_none() {
                errors.add("pub_date", "Enter a valid date/time.");
            }
        }

        let category_id = if check_required(&mut errors, "category", &self.category) {
            parse_choice(&mut errors, "category", &self.category, categories, |c| c.id)
        } else {
            None
        };
        let location_id =
            parse_choice(&mut errors, "location", &self.location, locations, |l| l.id);

        let upload = self.image.filter(|i| !i.is_empty());
        let image = match (upload, self.image_clear) {
            (Some(_), true) => {
                errors.add(
                    "image",
                    "Please either submit a file or check the clear checkbox, not both.",
                );
                ImageChange::Keep
            }
            (Some(image), false) => match image.format() {
                Some(format) => ImageChange::Replace { image, format },
                None => {
                    errors.add(
                        "image",
                        "Upload a valid image. The file you uploaded was either not an image or a corrupted image.",
                    );
                    ImageChange::Keep
                }
            },
            (None, true) => ImageChange::Clear,
            (None, false) => ImageChange::Keep,
        };

        let pub_date = match pub_date {
            Some(d) => d,
            None => return Err(errors),
        };
        errors.into_result(ValidPost {
            title: self.title.trim().to_string(),
            text: self.text.trim().to_string(),
            pub_date,
            location_id,
            category_id,
            is_published: self.is_published,
            image,
        })
    }
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct UserCreationForm {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default)]
    pub password1: String,
    #[serde(default)]
    pub password2: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ValidRegistration {
    pub username: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub password: String,
}

impl UserCreationForm {
    pub const FIELDS: &'static [&'static str] = &[
        "username",
        "email",
        "first_name",
        "last_name",
        "password1",
        "password2",
    ];

    pub fn validate(&self, username_taken: bool) -> Result<ValidRegistration, FormErrors> {
        let mut errors = FormErrors::new();
        let username = self.username.trim();
        let email = self.email.trim();

        check_username(&mut errors, username, username_taken);
        check_email(&mut errors, email);
        check_max_len(&mut errors, "first_name", self.first_name.trim(), NAME_MAX);
        check_max_len(&mut errors, "last_name", self.last_name.trim(), NAME_MAX);

        check_required(&mut errors, "password1", &self.password1);
        if check_required(&mut errors, "password2", &self.password2) {
            if self.password1 != self.password2 {
                errors.add("password2", "The two password fields didn't match.");
            } else {
                let password = self.password2.as_str();
                if password.chars().count() < PASSWORD_MIN {
                    errors.add(
                        "password2",
                        format!(
                            "This password is too short. It must contain at least {} characters.",
                            PASSWORD_MIN
                        ),
                    );
                }
                if password.chars().all(|c| c.is_ascii_digit()) {
                    errors.add("password2", "This password is entirely numeric.");
                }
                if !username.is_empty() && password.eq_ignore_ascii_case(username) {
                    errors.add("password2", "The password is too similar to the username.");
                }
            }
        }

        errors.into_result(ValidRegistration {
            username: username.to_string(),
            email: email.to_string(),
            first_name: self.first_name.trim().to_string(),
            last_name: self.last_name.trim().to_string(),
            password: self.password1.clone(),
        })
    }

    /// Passwords are never echoed back into the form.
    pub fn state(&self) -> FormState {
        FormState::new(
            Self::FIELDS,
            [
                ("username", self.username.clone()),
                ("email", self.email.clone()),
                ("first_name", self.first_name.clone()),
                ("last_name", self.last_name.clone()),
            ],
        )
    }

    pub fn blank() -> FormState {
        FormState::new(Self::FIELDS, std::iter::empty())
    }
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct UserUpdateForm {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ValidProfile {
    pub username: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
}

impl UserUpdateForm {
    pub const FIELDS: &'static [&'static str] = &["username", "email", "first_name", "last_name"];

    /// `username_taken` is whether another account already uses the
    /// submitted username.
    pub fn validate(&self, username_taken: bool) -> Result<ValidProfile, FormErrors> {
        let mut errors = FormErrors::new();
        let username = self.username.trim();
        let email = self.email.trim();

        check_username(&mut errors, username, username_taken);
        check_email(&mut errors, email);
        check_max_len(&mut errors, "first_name", self.first_name.trim(), NAME_MAX);
        check_max_len(&mut errors, "last_name", self.last_name.trim(), NAME_MAX);

        errors.into_result(ValidProfile {
            username: username.to_string(),
            email: email.to_string(),
            first_name: self.first_name.trim().to_string(),
            last_name: self.last_name.trim().to_string(),
        })
    }

    pub fn instance(user: &User) -> FormState {
        FormState::new(
            Self::FIELDS,
            [
                ("username", user.username.clone()),
                ("email", user.email.clone()),
                ("first_name", user.first_name.clone()),
                ("last_name", user.last_name.clone()),
            ],
        )
    }

    pub fn state(&self) -> FormState {
        FormState::new(
            Self::FIELDS,
            [
                ("username", self.username.clone()),
                ("email", self.email.clone()),
                ("first_name", self.first_name.clone()),
                ("last_name", self.last_name.clone()),
            ],
        )
    }
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct LoginForm {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
    pub next: Option<String>,
}

impl LoginForm {
    pub const FIELDS: &'static [&'static str] = &["username", "password"];

    pub fn validate(&self) -> Result<(String, String), FormErrors> {
        let mut errors = FormErrors::new();
        check_required(&mut errors, "username", &self.username);
        check_required(&mut errors, "password", &self.password);
        errors.into_result((self.username.trim().to_string(), self.password.clone()))
    }

    pub fn state(&self) -> FormState {
        FormState::new(Self::FIELDS, [("username", self.username.clone())])
    }

    pub fn blank() -> FormState {
        FormState::new(Self::FIELDS, std::iter::empty())
    }
}

#[cfg(test)]
mod test {
    use bytes::Bytes;
    use chrono::{FixedOffset, NaiveDate, Utc};

    use super::*;
    use crate::media_util::UploadedImage;
    use crate::models::{Category, Location};

    fn category(id: i32) -> Category {
        Category {
            id,
            title: "Travel".into(),
            description: "".into(),
            slug: "travel".into(),
            is_published: true,
            created_at: Utc::now().naive_utc(),
        }
    }

    fn location(id: i32) -> Location {
        Location {
            id,
            name: "Moscow".into(),
            is_published: true,
            created_at: Utc::now().naive_utc(),
        }
    }

    fn post_form() -> PostForm {
        PostForm {
            title: "  Hello  ".into(),
            text: "body".into(),
            pub_date: "2024-03-01T10:30".into(),
            location: "".into(),
            category: "1".into(),
            is_published: true,
            image_clear: false,
            image: None,
        }
    }

    fn utc() -> FixedOffset {
        FixedOffset::east_opt(0).unwrap()
    }

    #[test]
    fn comment_text_is_required() {
        let errors = CommentForm { text: "   ".into() }.validate().unwrap_err();
        assert_eq!(errors.for_field("text").collect::<Vec<_>>(), vec![REQUIRED]);

        let ok = CommentForm { text: " hi ".into() }.validate().unwrap();
        assert_eq!(ok.text, "hi");
    }

    #[test]
    fn valid_post_form() {
        let valid = post_form()
            .validate(&[category(1)], &[location(2)], &utc())
            .unwrap();
        assert_eq!(valid.title, "Hello");
        assert_eq!(valid.category_id, Some(1));
        assert_eq!(valid.location_id, None);
        assert_eq!(
            valid.pub_date,
            NaiveDate::from_ymd_opt(2024, 3, 1)
                .unwrap()
                .and_hms_opt(10, 30, 0)
                .unwrap()
        );
        assert!(matches!(valid.image, ImageChange::Keep));
    }

    #[test]
    fn post_form_reports_every_bad_field() {
        let form = PostForm {
            title: "x".repeat(300),
            text: "".into(),
            pub_date: "yesterday".into(),
            location: "99".into(),
            category: "".into(),
            ..PostForm::default()
        };
        let errors = form.validate(&[category(1)], &[location(2)], &utc()).unwrap_err();
        for field in ["title", "text", "pub_date", "location", "category"] {
            assert!(errors.has(field), "expected an error for {}", field);
        }
    }

    #[test]
    fn pub_date_is_read_in_site_timezone() {
        let moscow = FixedOffset::east_opt(3 * 3600).unwrap();
        let utc = parse_local_datetime("2024-03-01T10:30", &moscow).unwrap();
        assert_eq!(utc.format("%H:%M").to_string(), "07:30");
        assert_eq!(format_local_datetime(&utc, &moscow), "2024-03-01T10:30");
    }

    #[test]
    fn non_image_upload_is_rejected() {
        let form = PostForm {
            image: Some(UploadedImage {
                file_name: Some("notes.txt".into()),
                content_type: Some("text/plain".into()),
                data: Bytes::from_static(b"hello"),
            }),
            ..post_form()
        };
        let errors = form.validate(&[category(1)], &[], &utc()).unwrap_err();
        assert!(errors.has("image"));
    }

    #[test]
    fn markup_posing_as_an_image_is_rejected() {
        let form = PostForm {
            image: Some(UploadedImage {
                file_name: Some("cat.html".into()),
                content_type: Some("image/html".into()),
                data: Bytes::from_static(b"<script>alert(document.domain)</script>"),
            }),
            ..post_form()
        };
        let errors = form.validate(&[category(1)], &[], &utc()).unwrap_err();
        assert!(errors.has("image"));

        let form = PostForm {
            image: Some(UploadedImage {
                file_name: Some("cat.png".into()),
                content_type: Some("image/png".into()),
                data: Bytes::from_static(b"\x89PNG\r\n\x1a\n\0\0\0\rIHDR"),
            }),
            ..post_form()
        };
        let valid = form.validate(&[category(1)], &[], &utc()).unwrap();
        assert!(matches!(valid.image, ImageChange::Replace { ref format, .. } if format == "png"));
    }

    #[test]
    fn image_upload_and_clear_conflict() {
        let form = PostForm {
            image_clear: true,
            image: Some(UploadedImage {
                file_name: Some("cat.png".into()),
                content_type: Some("image/png".into()),
                data: Bytes::from_static(b"png"),
            }),
            ..post_form()
        };
        assert!(form.validate(&[category(1)], &[], &utc()).unwrap_err().has("image"));
    }

    #[test]
    fn registration_checks_passwords() {
        let mut form = UserCreationForm {
            username: "alice".into(),
            password1: "correct horse".into(),
            password2: "correct horse".into(),
            ..UserCreationForm::default()
        };
        assert!(form.validate(false).is_ok());
        assert!(form.validate(true).unwrap_err().has("username"));

        form.password2 = "battery staple".into();
        assert!(form.validate(false).unwrap_err().has("password2"));

        form.password1 = "12345678901".into();
        form.password2 = "12345678901".into();
        let errors = form.validate(false).unwrap_err();
        assert_eq!(
            errors.for_field("password2").collect::<Vec<_>>(),
            vec!["This password is entirely numeric."]
        );
    }

    #[test]
    fn usernames_and_emails_are_checked() {
        let form = UserUpdateForm {
            username: "bad name!".into(),
            email: "nope".into(),
            ..UserUpdateForm::default()
        };
        let errors = form.validate(false).unwrap_err();
        assert!(errors.has("username"));
        assert!(errors.has("email"));

        let form = UserUpdateForm {
            username: "good.name+1".into(),
            email: "someone@example.com".into(),
            ..UserUpdateForm::default()
        };
        assert!(form.validate(false).is_ok());
    }

    #[test]
    fn form_state_groups_errors_by_field() {
        let mut errors = FormErrors::new();
        errors.add("text", REQUIRED);
        errors.add(NON_FIELD, "nope");
        let state = CommentForm::default().state().with_errors(&errors);
        assert_eq!(state.errors["text"], vec![REQUIRED.to_string()]);
        assert_eq!(state.errors[NON_FIELD], vec!["nope".to_string()]);
        assert_eq!(state.values["text"], "");
    }
}
