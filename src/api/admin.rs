use log::info;
use mongodb::{Client, Database};
use rocket::{
    form::Form,
    request::FlashMessage,
    response::{Flash, Redirect},
    serde::json::Json,
    Route, State,
};

use crate::{
    error::{Error, Result},
    model::{
        api::{upload::save_optional, AdminPage, AdminSession, Notice, PollForm},
        db::{Choice, Contestant, Poll, PollSpec, PollTally},
        mongodb::Coll,
    },
    Config,
};

pub fn routes() -> Vec<Route> {
    routes![admin_page, admin_page_forbidden, create_poll, create_poll_forbidden]
}

/// The poll creation form, with the latest poll's results.
#[get("/admin", rank = 1)]
pub async fn admin_page(
    _admin: AdminSession,
    flash: Option<FlashMessage<'_>>,
    polls: Coll<Poll>,
    choices: Coll<Choice>,
) -> Result<Json<AdminPage>> {
    let tally = PollTally::latest(&polls, &choices).await?;
    Ok(Json(AdminPage {
        notice: flash.map(Notice::from),
        poll: tally.map(Into::into),
    }))
}

#[get("/admin", rank = 2)]
pub fn admin_page_forbidden() -> Error {
    Error::Unauthorized
}

/// Create a new poll, which immediately becomes the latest one.
#[post("/admin", data = "<form>", rank = 1)]
pub async fn create_poll(
    admin: AdminSession,
    form: Form<PollForm<'_>>,
    db_client: &State<Client>,
    db: &State<Database>,
    config: &State<Config>,
) -> Result<Flash<Redirect>> {
    let mut form = form.into_inner();
    let dir = config.poll_image_dir();
    let image = save_optional(&mut form.poll_image, dir).await?;
    let contestant1_image = save_optional(&mut form.contestant1_image, dir).await?;
    let contestant2_image = save_optional(&mut form.contestant2_image, dir).await?;

    let spec = PollSpec {
        question: form.question,
        name: form.poll_name,
        image,
        contestants: [
            Contestant {
                name: form.contestant1_name,
                image: contestant1_image,
            },
            Contestant {
                name: form.contestant2_name,
                image: contestant2_image,
            },
        ],
        choices: form.choices,
    };
    let created = Poll::create(db_client, db, spec).await?;
    info!(
        "Admin `{}` created poll {} with {} choices",
        admin.username,
        created.poll.id,
        created.choices.len()
    );

    Ok(Flash::success(
        Redirect::to(uri!(admin_page)),
        "Poll created successfully",
    ))
}

#[post("/admin", rank = 2)]
pub fn create_poll_forbidden() -> Error {
    Error::Unauthorized
}

#[cfg(test)]
mod tests {
    use rocket::{
        http::{ContentType, Status},
        local::asynchronous::Client,
        serde::json::serde_json,
    };

    use super::*;

    const POLL_FORM: &str = "question=Who+wins%3F&poll_name=Final&contestant1_name=A&contestant2_name=B\
        &choices=A&choices=&choices=++&choices=B";

    #[backend_test(admin)]
    async fn admin_creates_poll(client: Client, polls: Coll<Poll>, choices: Coll<Choice>) {
        let response = client
            .post(uri!(create_poll))
            .header(ContentType::Form)
            .body(POLL_FORM)
            .dispatch()
            .await;
        assert_eq!(Status::SeeOther, response.status());
        assert_eq!(Some("/admin"), response.headers().get_one("Location"));

        let tally = PollTally::latest(&polls, &choices).await.unwrap().unwrap();
        assert_eq!(tally.poll.question, "Who wins?");
        assert_eq!(tally.poll.name, "Final");
        assert_eq!(tally.poll.image, None);
        assert_eq!(tally.poll.contestants[1].name, "B");
        let texts = tally.choices.iter().map(|c| c.text.as_str()).collect::<Vec<_>>();
        assert_eq!(texts, vec!["A", "B"]);
        assert_eq!(tally.total_votes(), 0);

        let response = client.get(uri!(admin_page)).dispatch().await;
        assert_eq!(Status::Ok, response.status());
        let page: AdminPage = serde_json::from_str(&response.into_string().await.unwrap()).unwrap();
        assert_eq!(page.notice.unwrap().kind, "success");
        assert_eq!(page.poll.unwrap().id, tally.poll.id);
    }

    #[backend_test(user)]
    async fn non_admin_is_turned_away(client: Client, polls: Coll<Poll>) {
        let response = client.get(uri!(admin_page)).dispatch().await;
        assert_eq!(Status::SeeOther, response.status());
        assert_eq!(Some("/index"), response.headers().get_one("Location"));

        let response = client
            .post(uri!(create_poll))
            .header(ContentType::Form)
            .body(POLL_FORM)
            .dispatch()
            .await;
        assert_eq!(Status::SeeOther, response.status());
        assert_eq!(Some("/index"), response.headers().get_one("Location"));
        assert_eq!(polls.count_documents(None, None).await.unwrap(), 0);
    }
}
