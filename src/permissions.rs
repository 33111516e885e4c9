/// Mutation permissions for films
use crate::films::Film;

/// Decides whether a caller may edit or delete a film
pub trait PermissionGuard: Send + Sync {
    /// `caller_id` is `None` for anonymous callers
    fn can_mutate(&self, caller_id: Option<&str>, film: &Film) -> bool;
}

/// Only the creator of a film may mutate it
#[derive(Debug, Clone, Copy, Default)]
pub struct OwnershipGuard;

impl PermissionGuard for OwnershipGuard {
    fn can_mutate(&self, caller_id: Option<&str>, film: &Film) -> bool {
        match caller_id {
            Some(caller_id) => caller_id == film.creator_id,
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::films::FilmFields;

    fn film_by(creator: &str) -> Film {
        Film::new(creator, FilmFields {
            name: "Solaris".to_string(),
            ..Default::default()
        })
    }

    #[test]
    fn test_owner_may_mutate() {
        let guard = OwnershipGuard;
        for user in ["alice", "bob", "42", ""] {
            assert!(guard.can_mutate(Some(user), &film_by(user)));
        }
    }

    #[test]
    fn test_others_may_not_mutate() {
        let guard = OwnershipGuard;
        let users = ["alice", "bob", "Alice", "alice ", "42"];

        for owner in users {
            let film = film_by(owner);
            for caller in users.iter().filter(|u| **u != owner) {
                assert!(!guard.can_mutate(Some(*caller), &film), "{} vs {}", caller, owner);
            }
        }
    }

    #[test]
    fn test_anonymous_may_not_mutate() {
        let guard = OwnershipGuard;
        assert!(!guard.can_mutate(None, &film_by("alice")));
        assert!(!guard.can_mutate(None, &film_by("")));
    }
}
