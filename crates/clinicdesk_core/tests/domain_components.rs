use clinicdesk_core::db::DataSession;
use clinicdesk_core::model::user::NewUser;
use clinicdesk_core::model::ValidationError;
use clinicdesk_core::repo::{
    MacroRepository, PictureRepository, RepoError, SqliteMacroRepository, SqlitePictureRepository,
    SqliteTagRepository, SqliteUserRepository, TagRepository, UserRepository,
};
use clinicdesk_core::PermissionLevel;
use uuid::Uuid;

fn new_user(login: &str, permission: PermissionLevel) -> NewUser {
    NewUser {
        first_name: "Grace".to_string(),
        last_name: "Hopper".to_string(),
        login: login.to_string(),
        password: "cobol".to_string(),
        permission,
    }
}

#[test]
fn users_connect_only_with_matching_password() {
    let session = DataSession::open_in_memory().unwrap();
    let repo = SqliteUserRepository;

    let created = session
        .run(|uow| repo.create_user(uow, &new_user("grace", PermissionLevel::Write)))
        .unwrap();
    assert_eq!(created.display_name(), "Grace Hopper");

    let stored_hash: String = session
        .run(|uow| {
            uow.connection()
                .query_row("SELECT password_hash FROM users;", [], |row| row.get(0))
                .map_err(RepoError::from)
        })
        .unwrap();
    assert_ne!(stored_hash, "cobol");

    let connected = session
        .run(|uow| repo.can_connect(uow, "grace", "cobol"))
        .unwrap()
        .expect("valid credentials");
    assert_eq!(connected.id, created.id);
    assert_eq!(connected.permission, PermissionLevel::Write);

    let rejected = session
        .run(|uow| repo.can_connect(uow, "grace", "fortran"))
        .unwrap();
    assert!(rejected.is_none());
    let unknown = session
        .run(|uow| repo.can_connect(uow, "nobody", "cobol"))
        .unwrap();
    assert!(unknown.is_none());
}

#[test]
fn duplicate_login_is_a_conflict_regardless_of_case() {
    let session = DataSession::open_in_memory().unwrap();
    let repo = SqliteUserRepository;
    session
        .run(|uow| repo.create_user(uow, &new_user("grace", PermissionLevel::Read)))
        .unwrap();

    let err = session
        .run(|uow| repo.create_user(uow, &new_user("GRACE", PermissionLevel::Read)))
        .unwrap_err();
    assert!(matches!(err, RepoError::Conflict(_)));
    assert_eq!(session.run(|uow| repo.list_users(uow)).unwrap().len(), 1);
}

#[test]
fn macro_batch_update_rolls_back_as_a_whole() {
    let session = DataSession::open_in_memory().unwrap();
    let repo = SqliteMacroRepository;
    let (first, second) = session
        .run(|uow| {
            let first = repo.create_macro(uow, "Allergy")?;
            let second = repo.create_macro(uow, "Blood pressure")?;
            Ok::<_, RepoError>((first, second))
        })
        .unwrap();

    let mut edited_first = first.clone();
    edited_first.expression = "no known allergy".to_string();
    let mut broken_second = second.clone();
    broken_second.title = "   ".to_string();

    let err = session
        .run(|uow| repo.update_macros(uow, &[edited_first, broken_second]))
        .unwrap_err();
    assert!(matches!(
        err,
        RepoError::Validation(ValidationError::BlankField("title"))
    ));

    let reread = session.run(|uow| repo.list_macros(uow)).unwrap();
    assert_eq!(reread, vec![first, second]);
}

#[test]
fn macro_update_and_remove_report_missing_ids() {
    let session = DataSession::open_in_memory().unwrap();
    let repo = SqliteMacroRepository;
    let mut created = session
        .run(|uow| repo.create_macro(uow, "New macro"))
        .unwrap();

    created.expression = "BP: {systolic}/{diastolic}".to_string();
    session
        .run(|uow| repo.update_macros(uow, std::slice::from_ref(&created)))
        .unwrap();
    let listed = session.run(|uow| repo.list_macros(uow)).unwrap();
    assert_eq!(listed[0].expression, "BP: {systolic}/{diastolic}");

    let missing = Uuid::new_v4();
    let err = session
        .run(|uow| repo.remove_macro(uow, missing))
        .unwrap_err();
    assert!(matches!(err, RepoError::NotFound(id) if id == missing));

    session.run(|uow| repo.remove_macro(uow, created.id)).unwrap();
    assert!(session.run(|uow| repo.list_macros(uow)).unwrap().is_empty());
}

#[test]
fn tags_are_grouped_by_category_and_renamable() {
    let session = DataSession::open_in_memory().unwrap();
    let repo = SqliteTagRepository;
    let xray = session
        .run(|uow| {
            repo.create_tag(uow, "Pathology", "Diabetes")?;
            repo.create_tag(uow, "picture", "X-ray")
        })
        .unwrap();

    let pathology = session
        .run(|uow| repo.list_tags(uow, Some("pathology")))
        .unwrap();
    assert_eq!(pathology.len(), 1);
    assert_eq!(pathology[0].category, "pathology");

    let err = session
        .run(|uow| repo.create_tag(uow, "picture", "X-ray"))
        .unwrap_err();
    assert!(matches!(err, RepoError::Conflict(_)));

    session
        .run(|uow| repo.rename_tag(uow, xray.id, " Radiography "))
        .unwrap();
    let pictures = session
        .run(|uow| repo.list_tags(uow, Some("picture")))
        .unwrap();
    assert_eq!(pictures[0].name, "Radiography");

    let err = session
        .run(|uow| repo.rename_tag(uow, Uuid::new_v4(), "Other"))
        .unwrap_err();
    assert!(matches!(err, RepoError::NotFound(_)));
}

#[test]
fn pictures_filter_by_patient_and_keep_tag_reference() {
    let session = DataSession::open_in_memory().unwrap();
    let tags = SqliteTagRepository;
    let pictures = SqlitePictureRepository;

    let tag = session
        .run(|uow| tags.create_tag(uow, "picture", "Dermatology"))
        .unwrap();
    session
        .run(|uow| {
            pictures.add_picture(uow, "Doe", "mole.png", Some(tag.id))?;
            pictures.add_picture(uow, "Roe", "scar.png", None)
        })
        .unwrap();

    let doe = session
        .run(|uow| pictures.list_pictures(uow, Some("Doe")))
        .unwrap();
    assert_eq!(doe.len(), 1);
    assert_eq!(doe[0].tag_id, Some(tag.id));
    assert_eq!(
        session.run(|uow| pictures.list_pictures(uow, None)).unwrap().len(),
        2
    );

    let err = session
        .run(|uow| pictures.add_picture(uow, "Doe", "../etc/passwd", None))
        .unwrap_err();
    assert!(matches!(err, RepoError::Validation(_)));
}
