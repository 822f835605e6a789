//! User model tests: signup, authentication, follow relationships and
//! cascading deletes, each against a fresh in-memory database.

use warbler_db::{Database, DbError, NewUser, ProfileUpdate, UserRow};

struct Fixture {
    db: Database,
    u: UserRow,
    u2: UserRow,
}

fn new_user(username: &str, email: &str, password: &str) -> NewUser {
    NewUser {
        username: username.to_string(),
        email: email.to_string(),
        password: password.to_string(),
        image_url: Some(String::new()),
    }
}

fn setup() -> Fixture {
    let db = Database::open_in_memory().unwrap();
    let u = db
        .signup(&new_user("testuser", "test@test.com", "HASHED_PASSWORD"))
        .unwrap();
    let u2 = db
        .signup(&new_user("testuser2", "test2@test.com", "HASHED_PASSWORD2"))
        .unwrap();
    Fixture { db, u, u2 }
}

#[test]
fn new_user_has_no_messages_or_followers() {
    let f = setup();
    let stats = f.db.user_stats(&f.u.id).unwrap();
    assert_eq!(stats.messages, 0);
    assert_eq!(stats.followers, 0);
    assert!(f.db.followers(&f.u.id).unwrap().is_empty());
}

#[test]
fn display_format() {
    let f = setup();
    let u = f.db.get_user(&f.u.id).unwrap().unwrap();
    assert_eq!(u.to_string(), format!("<User #{}: testuser, test@test.com>", f.u.id));
}

#[test]
fn signup_fills_image_defaults_and_hashes() {
    let f = setup();
    let u = f.db.get_user(&f.u.id).unwrap().unwrap();
    assert_eq!(u.image_url, "/static/images/default-pic.png");
    assert_eq!(u.header_image_url, "/static/images/warbler-hero.jpg");
    assert_eq!(u.bio, None);
    assert_ne!(u.password, "HASHED_PASSWORD");
    assert!(u.password.starts_with("$argon2"));
}

#[test]
fn is_following_both_ways() {
    let f = setup();
    f.db.follow(&f.u.id, &f.u2.id).unwrap();
    f.db.follow(&f.u2.id, &f.u.id).unwrap();

    assert!(f.db.is_following(&f.u.id, &f.u2.id).unwrap());
    assert!(f.db.is_following(&f.u2.id, &f.u.id).unwrap());
}

#[test]
fn is_not_following() {
    let f = setup();
    assert!(!f.db.is_following(&f.u.id, &f.u2.id).unwrap());
    assert!(!f.db.is_following(&f.u2.id, &f.u.id).unwrap());
}

#[test]
fn is_followed_by_both_ways() {
    let f = setup();
    f.db.follow(&f.u.id, &f.u2.id).unwrap();
    f.db.follow(&f.u2.id, &f.u.id).unwrap();

    assert!(f.db.is_followed_by(&f.u.id, &f.u2.id).unwrap());
    assert!(f.db.is_followed_by(&f.u2.id, &f.u.id).unwrap());
}

#[test]
fn is_not_followed_by() {
    let f = setup();
    assert!(!f.db.is_followed_by(&f.u.id, &f.u2.id).unwrap());
    assert!(!f.db.is_followed_by(&f.u2.id, &f.u.id).unwrap());
}

#[test]
fn one_directional_edge_is_consistent() {
    let f = setup();
    assert!(f.db.follow(&f.u.id, &f.u2.id).unwrap());

    assert!(f.db.is_following(&f.u.id, &f.u2.id).unwrap());
    assert!(f.db.is_followed_by(&f.u2.id, &f.u.id).unwrap());
    assert!(!f.db.is_following(&f.u2.id, &f.u.id).unwrap());
    assert!(!f.db.is_followed_by(&f.u.id, &f.u2.id).unwrap());

    assert_eq!(f.db.following(&f.u.id).unwrap(), vec![f.u2.clone()]);
    assert_eq!(f.db.followers(&f.u2.id).unwrap(), vec![f.u.clone()]);
    assert!(f.db.followers(&f.u.id).unwrap().is_empty());
}

#[test]
fn follow_is_idempotent_and_unfollow_removes() {
    let f = setup();
    assert!(f.db.follow(&f.u.id, &f.u2.id).unwrap());
    assert!(!f.db.follow(&f.u.id, &f.u2.id).unwrap());
    assert_eq!(f.db.user_stats(&f.u.id).unwrap().following, 1);

    assert!(f.db.unfollow(&f.u.id, &f.u2.id).unwrap());
    assert!(!f.db.unfollow(&f.u.id, &f.u2.id).unwrap());
    assert!(!f.db.is_following(&f.u.id, &f.u2.id).unwrap());
}

#[test]
fn follow_unknown_user_is_missing_reference() {
    let f = setup();
    let err = f.db.follow(&f.u.id, "no-such-user").unwrap_err();
    assert!(matches!(err, DbError::MissingReference));
}

#[test]
fn signup_success() {
    let f = setup();
    let u = f
        .db
        .signup(&new_user("test3", "donthackmyhash@test.com", "superHash"))
        .unwrap();

    let users = f.db.list_users(None).unwrap();
    assert!(users.contains(&u));
    assert_eq!(users.len(), 3);
}

#[test]
fn signup_missing_fields() {
    let f = setup();

    let err = f
        .db
        .signup(&new_user("", "donthackmyhash@test.com", "superHash"))
        .unwrap_err();
    assert!(matches!(err, DbError::MissingField("username")));

    let err = f
        .db
        .signup(&new_user("test3", "donthackmyhash@test.com", ""))
        .unwrap_err();
    assert!(matches!(err, DbError::MissingField("password")));

    let err = f.db.signup(&new_user("test3", "  ", "superHash")).unwrap_err();
    assert!(matches!(err, DbError::MissingField("email")));

    assert_eq!(f.db.list_users(None).unwrap().len(), 2);
}

#[test]
fn signup_duplicate_username() {
    let f = setup();
    let err = f
        .db
        .signup(&new_user("testuser", "donthackmyhash@test.com", "superHash"))
        .unwrap_err();
    assert!(err.is_unique_violation_on("users.username"), "{err}");
}

#[test]
fn signup_duplicate_email() {
    let f = setup();
    let err = f
        .db
        .signup(&new_user("test3", "test@test.com", "superHash"))
        .unwrap_err();
    assert!(err.is_unique_violation_on("users.email"), "{err}");
}

#[test]
fn authenticate_success() {
    let f = setup();
    let auth_u = f.db.authenticate("testuser", "HASHED_PASSWORD").unwrap();
    assert_eq!(auth_u, Some(f.u.clone()));
}

#[test]
fn authenticate_bad_username() {
    let f = setup();
    assert!(f.db.authenticate("testuser33", "HASHED_PASSWORD").unwrap().is_none());
}

#[test]
fn authenticate_bad_password() {
    let f = setup();
    assert!(f.db.authenticate("testuser", "HASHED_PASSWORD33").unwrap().is_none());
}

#[test]
fn list_users_search() {
    let f = setup();
    f.db.signup(&new_user("someone_else", "else@test.com", "superHash")).unwrap();

    let found = f.db.list_users(Some("TESTUSER")).unwrap();
    let names: Vec<&str> = found.iter().map(|u| u.username.as_str()).collect();
    assert_eq!(names, ["testuser", "testuser2"]);

    // `_` is matched literally, not as a wildcard.
    let found = f.db.list_users(Some("e_e")).unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].username, "someone_else");
    assert!(f.db.list_users(Some("t_s")).unwrap().is_empty());

    assert_eq!(f.db.list_users(Some("  ")).unwrap().len(), 3);
}

#[test]
fn update_profile() {
    let f = setup();
    let update = ProfileUpdate {
        username: "renamed".into(),
        email: "renamed@test.com".into(),
        image_url: Some("https://img.example.com/me.png".into()),
        header_image_url: None,
        bio: Some("Just a test account.".into()),
    };

    let u = f.db.update_profile(&f.u.id, &update).unwrap().unwrap();
    assert_eq!(u.username, "renamed");
    assert_eq!(u.image_url, "https://img.example.com/me.png");
    assert_eq!(u.header_image_url, "/static/images/warbler-hero.jpg");
    assert_eq!(u.bio.as_deref(), Some("Just a test account."));

    // The password hash is untouched.
    assert!(f.db.authenticate("renamed", "HASHED_PASSWORD").unwrap().is_some());
    assert!(f.db.update_profile("missing", &update).unwrap().is_none());
}

#[test]
fn confirmed_profile_update_checks_password() {
    let f = setup();
    let update = ProfileUpdate {
        username: "renamed".into(),
        email: "renamed@test.com".into(),
        ..Default::default()
    };

    assert!(f.db.update_profile_confirmed(&f.u.id, "wrong-password", &update).unwrap().is_none());
    assert_eq!(f.db.get_user(&f.u.id).unwrap().unwrap().username, "testuser");

    let u = f.db
        .update_profile_confirmed(&f.u.id, "HASHED_PASSWORD", &update)
        .unwrap()
        .unwrap();
    assert_eq!(u.username, "renamed");
    assert!(f.db.update_profile_confirmed("missing", "HASHED_PASSWORD", &update).unwrap().is_none());
}

#[test]
fn update_profile_to_taken_email() {
    let f = setup();
    let update = ProfileUpdate {
        username: "testuser".into(),
        email: "test2@test.com".into(),
        ..Default::default()
    };
    let err = f.db.update_profile(&f.u.id, &update).unwrap_err();
    assert!(err.is_unique_violation_on("users.email"));
}

#[test]
fn delete_user_cascades() {
    let f = setup();
    let m1 = f.db.create_message(&f.u.id, "This is test msg one.").unwrap();
    let m2 = f.db.create_message(&f.u2.id, "This is test msg two.").unwrap();
    f.db.follow(&f.u.id, &f.u2.id).unwrap();
    f.db.follow(&f.u2.id, &f.u.id).unwrap();
    f.db.like_message(&f.u.id, &m2.id).unwrap();
    f.db.like_message(&f.u2.id, &m1.id).unwrap();

    assert!(f.db.delete_user(&f.u.id).unwrap());
    assert!(!f.db.delete_user(&f.u.id).unwrap());

    assert!(f.db.get_user(&f.u.id).unwrap().is_none());
    assert!(f.db.get_message(&m1.id).unwrap().is_none());
    assert!(f.db.followers(&f.u2.id).unwrap().is_empty());
    assert!(f.db.following(&f.u2.id).unwrap().is_empty());
    assert!(f.db.users_liked(&m2.id).unwrap().is_empty());
    assert!(f.db.liked_messages(&f.u2.id).unwrap().is_empty());

    let stats = f.db.user_stats(&f.u2.id).unwrap();
    assert_eq!(stats.messages, 1);
    assert_eq!(stats.following, 0);
    assert_eq!(stats.followers, 0);
    assert_eq!(stats.likes, 0);
}
