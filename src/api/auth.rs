use log::{info, warn};
use rocket::{
    form::Form,
    http::CookieJar,
    request::FlashMessage,
    response::{Flash, Redirect},
    serde::json::Json,
    Route, State,
};

use crate::{
    error::{Error, Result},
    model::{
        api::{
            upload::{provided, save_upload},
            LoginForm, LoginPage, Notice, Session, SignupForm, SignupPage,
        },
        db::{NewUser, User},
        mongodb::Coll,
    },
    Config,
};

pub fn routes() -> Vec<Route> {
    routes![login_page, login, signup_page, signup, logout]
}

/// The login page, or a redirect for a client that is already logged in.
#[derive(Responder)]
pub enum LoginResponse {
    Page(Json<LoginPage>),
    Redirect(Redirect),
}

#[get("/")]
pub async fn login_page(
    session: Session,
    flash: Option<FlashMessage<'_>>,
) -> LoginResponse {
    if session.is_authenticated() {
        LoginResponse::Redirect(Redirect::to(uri!(crate::api::poll::index)))
    } else {
        LoginResponse::Page(Json(LoginPage {
            notice: flash.map(Notice::from),
        }))
    }
}

#[post("/", data = "<credentials>")]
pub async fn login(
    cookies: &CookieJar<'_>,
    credentials: Form<LoginForm>,
    users: Coll<User>,
) -> Result<Redirect> {
    let user = User::find_by_credentials(&users, &credentials.username, &credentials.password)
        .await?
        .ok_or_else(|| {
            warn!("Failed login attempt for `{}`", credentials.username);
            Error::InvalidCredentials
        })?;

    Session::login(cookies, &user);
    info!("User `{}` logged in", user.username);
    Ok(Redirect::to(uri!(crate::api::poll::index)))
}

#[get("/signup")]
pub async fn signup_page(flash: Option<FlashMessage<'_>>) -> Json<SignupPage> {
    Json(SignupPage {
        notice: flash.map(Notice::from),
    })
}

#[post("/signup", data = "<form>")]
pub async fn signup(
    form: Form<SignupForm<'_>>,
    users: Coll<User>,
    config: &State<Config>,
) -> Result<Flash<Redirect>> {
    let mut form = form.into_inner();

    // Check username uniqueness before storing any files.
    if User::find_by_username(&users, &form.username).await?.is_some() {
        return Err(Error::DuplicateUsername);
    }

    let (Some(front_id), Some(back_id)) = (provided(&mut form.front_id), provided(&mut form.back_id)) else {
        return Err(Error::MissingUploads);
    };
    let dir = config.id_upload_dir();
    let front_id_image = save_upload(front_id, dir).await?;
    let back_id_image = save_upload(back_id, dir).await?;

    let new_user = NewUser {
        full_name: Some(form.full_name.trim().to_string()),
        email: Some(form.email),
        username: form.username,
        password: form.password,
        is_admin: false,
        front_id_image,
        back_id_image,
    };
    let user = User::create(&users, new_user).await?;
    info!("Signed up new user `{}`", user.username);

    Ok(Flash::success(
        Redirect::to(uri!(login_page)),
        "Signup successful, please log in",
    ))
}

#[get("/logout")]
pub fn logout(cookies: &CookieJar<'_>) -> Redirect {
    Session::logout(cookies);
    Redirect::to(uri!(login_page))
}

#[cfg(test)]
mod tests {
    use rocket::{
        http::{ContentType, Status},
        local::asynchronous::Client,
        serde::json::serde_json,
    };

    use crate::model::api::SESSION_COOKIE;
    use crate::model::db::UserCore;

    use super::*;

    const BOUNDARY: &str = "X-POLL-BOUNDARY";

    fn multipart_type() -> ContentType {
        ContentType::new("multipart", "form-data").with_params(("boundary", BOUNDARY))
    }

    /// A multipart signup body. `files` are `(field, filename)` pairs, each
    /// holding `content`.
    fn signup_body(
        full_name: &str,
        username: &str,
        files: &[(&str, &str)],
        content: &str,
    ) -> String {
        let mut body = String::new();
        let fields = [
            ("full_name", full_name),
            ("email", "bob@example.com"),
            ("username", username),
            ("password", "builder"),
        ];
        for (name, value) in fields {
            body.push_str(&format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
            ));
        }
        for (name, filename) in files {
            body.push_str(&format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"; filename=\"{filename}\"\r\nContent-Type: image/png\r\n\r\n{content}\r\n"
            ));
        }
        body.push_str(&format!("--{BOUNDARY}--\r\n"));
        body
    }

    async fn notice(client: &Client, page: &str) -> Option<Notice> {
        let response = client.get(page).dispatch().await;
        assert_eq!(Status::Ok, response.status());
        let raw = response.into_string().await.unwrap();
        let page = serde_json::from_str::<serde_json::Value>(&raw).unwrap();
        serde_json::from_value(page["notice"].clone()).unwrap()
    }

    #[backend_test]
    async fn login_valid(client: Client, users: Coll<User>) {
        User::create(&users, UserCore::example()).await.unwrap();

        let response = client
            .post(uri!(login))
            .header(ContentType::Form)
            .body("username=alice&password=wonderland")
            .dispatch()
            .await;

        assert_eq!(Status::SeeOther, response.status());
        assert_eq!(Some("/index"), response.headers().get_one("Location"));
        assert!(client.cookies().get_private(SESSION_COOKIE).is_some());

        // Already logged in, so the login page sends us on.
        let response = client.get(uri!(login_page)).dispatch().await;
        assert_eq!(Status::SeeOther, response.status());
        assert_eq!(Some("/index"), response.headers().get_one("Location"));
    }

    #[backend_test]
    async fn login_invalid(client: Client, users: Coll<User>) {
        User::create(&users, UserCore::example()).await.unwrap();

        for body in [
            "username=alice&password=wrong",
            "username=nobody&password=wonderland",
        ] {
            let response = client
                .post(uri!(login))
                .header(ContentType::Form)
                .body(body)
                .dispatch()
                .await;
            assert_eq!(Status::SeeOther, response.status());
            assert_eq!(Some("/"), response.headers().get_one("Location"));
            assert!(client.cookies().get_private(SESSION_COOKIE).is_none());

            let notice = notice(&client, "/").await.unwrap();
            assert_eq!(notice.kind, "error");
            assert_eq!(notice.message, Error::InvalidCredentials.to_string());
        }
    }

    #[backend_test]
    async fn signup_creates_user(client: Client, users: Coll<User>) {
        let response = client
            .post(uri!(signup))
            .header(multipart_type())
            .body(signup_body(
                "  Bob Example ",
                "bob",
                &[("front_id", "front.png"), ("back_id", "../back.png")],
                "not really a png",
            ))
            .dispatch()
            .await;
        assert_eq!(Status::SeeOther, response.status());
        assert_eq!(Some("/"), response.headers().get_one("Location"));

        let notice = notice(&client, "/").await.unwrap();
        assert_eq!(notice.kind, "success");

        let bob = User::find_by_credentials(&users, "bob", "builder")
            .await
            .unwrap()
            .unwrap();
        assert!(!bob.is_admin);
        assert_eq!(bob.full_name.as_deref(), Some("Bob Example"));
        assert_eq!(bob.front_id_image.as_deref(), Some("front.png"));
        assert_eq!(bob.back_id_image.as_deref(), Some("back.png"));

        let config = client.rocket().state::<Config>().unwrap();
        assert!(config.id_upload_dir().join("front.png").exists());
        assert!(config.id_upload_dir().join("back.png").exists());
    }

    #[backend_test]
    async fn signup_accepts_large_photos(client: Client, users: Coll<User>) {
        // Larger than Rocket's built-in 1 MiB file limit.
        let photo = "x".repeat(1_500_000);
        let response = client
            .post(uri!(signup))
            .header(multipart_type())
            .body(signup_body(
                "Bob Example",
                "bob",
                &[("front_id", "big_front.png"), ("back_id", "big_back.png")],
                &photo,
            ))
            .dispatch()
            .await;
        assert_eq!(Status::SeeOther, response.status());
        assert_eq!(Some("/"), response.headers().get_one("Location"));

        let bob = User::find_by_username(&users, "bob").await.unwrap().unwrap();
        assert_eq!(bob.front_id_image.as_deref(), Some("big_front.png"));
        assert_eq!(bob.back_id_image.as_deref(), Some("big_back.png"));

        let config = client.rocket().state::<Config>().unwrap();
        for name in ["big_front.png", "big_back.png"] {
            let stored = std::fs::metadata(config.id_upload_dir().join(name)).unwrap();
            assert_eq!(stored.len(), photo.len() as u64);
        }
    }

    #[backend_test]
    async fn signup_accepts_empty_named_file(client: Client, users: Coll<User>) {
        let response = client
            .post(uri!(signup))
            .header(multipart_type())
            .body(signup_body(
                "Bob Example",
                "bob",
                &[("front_id", "front.png"), ("back_id", "empty.png")],
                "",
            ))
            .dispatch()
            .await;
        assert_eq!(Status::SeeOther, response.status());
        assert_eq!(Some("/"), response.headers().get_one("Location"));

        let bob = User::find_by_username(&users, "bob").await.unwrap().unwrap();
        assert_eq!(bob.back_id_image.as_deref(), Some("empty.png"));
    }

    #[backend_test]
    async fn signup_duplicate_username(client: Client, users: Coll<User>) {
        let original = User::create(&users, UserCore::example()).await.unwrap();

        let response = client
            .post(uri!(signup))
            .header(multipart_type())
            .body(signup_body(
                "Alice",
                "alice",
                &[("front_id", "f.png"), ("back_id", "b.png")],
                "png",
            ))
            .dispatch()
            .await;
        assert_eq!(Status::SeeOther, response.status());
        assert_eq!(Some("/signup"), response.headers().get_one("Location"));

        let notice = notice(&client, "/signup").await.unwrap();
        assert_eq!(notice.message, Error::DuplicateUsername.to_string());

        assert_eq!(users.count_documents(None, None).await.unwrap(), 1);
        let stored = User::find_by_username(&users, "alice").await.unwrap().unwrap();
        assert_eq!(stored, original);
    }

    #[backend_test]
    async fn signup_requires_both_uploads(client: Client, users: Coll<User>) {
        let response = client
            .post(uri!(signup))
            .header(multipart_type())
            .body(signup_body("Bob Example", "bob", &[("front_id", "front.png")], "png"))
            .dispatch()
            .await;
        assert_eq!(Status::SeeOther, response.status());
        assert_eq!(Some("/signup"), response.headers().get_one("Location"));

        let notice = notice(&client, "/signup").await.unwrap();
        assert_eq!(notice.message, Error::MissingUploads.to_string());
        assert_eq!(users.count_documents(None, None).await.unwrap(), 0);
    }

    #[backend_test(user)]
    async fn logout_clears_session(client: Client) {
        assert!(client.cookies().get_private(SESSION_COOKIE).is_some());

        let response = client.get(uri!(logout)).dispatch().await;
        assert_eq!(Status::SeeOther, response.status());
        assert!(client.cookies().get_private(SESSION_COOKIE).is_none());

        // Protected pages now send us back to the login page.
        let response = client.get("/index").dispatch().await;
        assert_eq!(Status::SeeOther, response.status());
        assert_eq!(Some("/"), response.headers().get_one("Location"));
    }
}
