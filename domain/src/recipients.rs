use crate::Id;

/// Ordered, de-duplicated set of users to notify about one change.
///
/// A user reachable through two roles (say, ride passenger and booking
/// passenger) is listed once. Id 0 is never a real user and is skipped.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct Recipients(Vec<Id>);

impl Recipients {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, user_id: Id) -> &mut Self {
        if user_id != 0 && !self.0.contains(&user_id) {
            self.0.push(user_id);
        }
        self
    }

    pub fn add_opt(&mut self, user_id: Option<Id>) -> &mut Self {
        if let Some(user_id) = user_id {
            self.add(user_id);
        }
        self
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn into_vec(self) -> Vec<Id> {
        self.0
    }
}

impl FromIterator<Id> for Recipients {
    fn from_iter<I: IntoIterator<Item = Id>>(iter: I) -> Self {
        let mut recipients = Recipients::new();
        for user_id in iter {
            recipients.add(user_id);
        }
        recipients
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_duplicates_and_zero_are_dropped_in_order() {
        let recipients: Recipients = [3, 0, 1, 3, 2, 1].into_iter().collect();
        assert_eq!(recipients.into_vec(), vec![3, 1, 2]);
    }

    #[test]
    fn test_absent_optional_user_is_skipped() {
        let mut recipients = Recipients::new();
        recipients.add(5).add_opt(None).add_opt(Some(6));
        assert_eq!(recipients.into_vec(), vec![5, 6]);
    }
}
