//! Super-admin protection and admin list ordering.
//!
//! A small, configured list of owner accounts can never be demoted or
//! deleted through the admin API, and always sorts to the top of the admin
//! list in the configured order.

use std::cmp::Ordering;

use chrono::{DateTime, Utc};

use crate::Email;

/// Default owner accounts, used when no list is configured.
pub const DEFAULT_SUPER_ADMINS: &[&str] = &["owner@mindymunchs.com", "admin@mindymunchs.com"];

/// Anything that can be placed in the admin list.
pub trait AdminEntry {
    /// The account's email address.
    fn email(&self) -> &str;
    /// When the account was created.
    fn created_at(&self) -> DateTime<Utc>;
}

/// The configured, ordered list of protected super-admin addresses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SuperAdminList {
    emails: Vec<String>,
}

impl Default for SuperAdminList {
    fn default() -> Self {
        Self::new(DEFAULT_SUPER_ADMINS.iter().copied())
    }
}

impl SuperAdminList {
    /// Build a list from raw strings.
    ///
    /// Entries are trimmed and lower-cased; blanks and duplicates are dropped
    /// while keeping first-seen order.
    pub fn new<I, S>(emails: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut normalized: Vec<String> = Vec::new();
        for email in emails {
            let email = normalize(email.as_ref());
            if !email.is_empty() && !normalized.contains(&email) {
                normalized.push(email);
            }
        }
        Self { emails: normalized }
    }

    /// Parse a comma-separated list (as found in an environment variable).
    #[must_use]
    pub fn from_csv(csv: &str) -> Self {
        Self::new(csv.split(','))
    }

    /// The normalized addresses, in priority order.
    #[must_use]
    pub fn emails(&self) -> &[String] {
        &self.emails
    }

    /// Position of `email` in the list, if it is protected.
    ///
    /// Matching is layered: the address is first compared after trimming and
    /// lower-casing, then with any `+tag` sub-address removed from both sides,
    /// so `Owner+test@MindyMunchs.com` still resolves to the owner account.
    #[must_use]
    pub fn rank(&self, email: &str) -> Option<usize> {
        let candidate = normalize(email);
        if candidate.is_empty() {
            return None;
        }

        if let Some(pos) = self.emails.iter().position(|e| *e == candidate) {
            return Some(pos);
        }

        let base = Email::parse(&candidate).ok()?.without_subaddress();
        self.emails.iter().position(|e| {
            Email::parse(e)
                .map(|listed| listed.without_subaddress() == base)
                .unwrap_or(false)
        })
    }

    /// Whether `email` belongs to a protected super-admin.
    #[must_use]
    pub fn is_protected(&self, email: &str) -> bool {
        self.rank(email).is_some()
    }

    /// Admin list ordering.
    ///
    /// Super-admins come first in configured order; everyone else follows,
    /// oldest account first, with the email as a final tie-breaker.
    pub fn compare<A: AdminEntry, B: AdminEntry>(&self, a: &A, b: &B) -> Ordering {
        match (self.rank(a.email()), self.rank(b.email())) {
            (Some(ra), Some(rb)) => ra.cmp(&rb),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => a
                .created_at()
                .cmp(&b.created_at())
                .then_with(|| normalize(a.email()).cmp(&normalize(b.email()))),
        }
    }

    /// Sort admins in place using [`SuperAdminList::compare`].
    pub fn sort<T: AdminEntry>(&self, admins: &mut [T]) {
        admins.sort_by(|a, b| self.compare(a, b));
    }
}

fn normalize(email: &str) -> String {
    email.trim().to_lowercase()
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    struct Entry {
        email: &'static str,
        created_at: DateTime<Utc>,
    }

    impl AdminEntry for Entry {
        fn email(&self) -> &str {
            self.email
        }

        fn created_at(&self) -> DateTime<Utc> {
            self.created_at
        }
    }

    fn day(d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 1, d, 0, 0, 0)
            .single()
            .unwrap_or_default()
    }

    fn list() -> SuperAdminList {
        SuperAdminList::from_csv("owner@mindymunchs.com, Admin@MindyMunchs.com ,,")
    }

    #[test]
    fn test_from_csv_normalizes() {
        assert_eq!(
            list().emails(),
            ["owner@mindymunchs.com", "admin@mindymunchs.com"]
        );
    }

    #[test]
    fn test_default_list() {
        assert_eq!(SuperAdminList::default().emails().len(), 2);
    }

    #[test]
    fn test_is_protected_exact_and_case() {
        let list = list();
        assert!(list.is_protected("owner@mindymunchs.com"));
        assert!(list.is_protected("  OWNER@mindymunchs.com "));
        assert!(!list.is_protected("someone@mindymunchs.com"));
        assert!(!list.is_protected(""));
    }

    #[test]
    fn test_is_protected_subaddress() {
        let list = list();
        assert!(list.is_protected("owner+orders@mindymunchs.com"));
        assert!(!list.is_protected("owner@mindymunchs.co"));
    }

    #[test]
    fn test_rank_order() {
        let list = list();
        assert_eq!(list.rank("owner@mindymunchs.com"), Some(0));
        assert_eq!(list.rank("admin@mindymunchs.com"), Some(1));
        assert_eq!(list.rank("staff@mindymunchs.com"), None);
    }

    #[test]
    fn test_sort_puts_super_admins_first() {
        let list = list();
        let mut admins = vec![
            Entry {
                email: "zed@mindymunchs.com",
                created_at: day(1),
            },
            Entry {
                email: "admin@mindymunchs.com",
                created_at: day(9),
            },
            Entry {
                email: "amy@mindymunchs.com",
                created_at: day(3),
            },
            Entry {
                email: "owner@mindymunchs.com",
                created_at: day(20),
            },
        ];

        list.sort(&mut admins);

        let order: Vec<&str> = admins.iter().map(|a| a.email).collect();
        assert_eq!(
            order,
            [
                "owner@mindymunchs.com",
                "admin@mindymunchs.com",
                "zed@mindymunchs.com",
                "amy@mindymunchs.com",
            ]
        );
    }

    #[test]
    fn test_compare_ties_break_on_email() {
        let list = list();
        let a = Entry {
            email: "a@x.com",
            created_at: day(2),
        };
        let b = Entry {
            email: "b@x.com",
            created_at: day(2),
        };
        assert_eq!(list.compare(&a, &b), Ordering::Less);
        assert_eq!(list.compare(&b, &a), Ordering::Greater);
    }
}
