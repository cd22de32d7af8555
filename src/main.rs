use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;

use dashmap::DashMap;
use warp::Filter;

use lectern::config::{self, Configuration};
use lectern::handler;
use lectern::room::Rooms;
use lectern::store::Store;

#[tokio::main]
async fn main() {
    env_logger::init();
    let config = config::load_configuration();

    let store = Store::new();
    let rooms: Rooms = Arc::new(DashMap::new());

    let health_route = warp::path!("health").and_then(handler::health_handler);

    let create_session = warp::path!("session")
        .and(warp::post())
        .and(warp::header::<String>("authorization"))
        .and(with_config(config.clone()))
        .and(with_store(store.clone()))
        .and(with_rooms(rooms.clone()))
        .and_then(handler::create_session_handler);

    let stop_session = warp::path!("session" / "stop")
        .and(warp::post())
        .and(warp::body::json())
        .and(warp::header::<String>("authorization"))
        .and(with_config(config.clone()))
        .and(with_store(store.clone()))
        .and(with_rooms(rooms.clone()))
        .and_then(handler::stop_session_handler);

    let join = warp::path!("join")
        .and(warp::post())
        .and(warp::body::json())
        .and(with_store(store.clone()))
        .and(with_rooms(rooms.clone()))
        .and_then(handler::join_handler);

    let create_presentation = warp::path!("presentation")
        .and(warp::post())
        .and(warp::header::<String>("authorization"))
        .and(with_config(config.clone()))
        .and(warp::body::json())
        .and(with_store(store.clone()))
        .and_then(handler::create_presentation_handler);

    let create_poll = warp::path!("poll")
        .and(warp::post())
        .and(warp::header::<String>("authorization"))
        .and(with_config(config.clone()))
        .and(warp::body::json())
        .and(with_store(store.clone()))
        .and_then(handler::create_poll_handler);

    let create_bank = warp::path!("bank")
        .and(warp::post())
        .and(warp::header::<String>("authorization"))
        .and(with_config(config.clone()))
        .and(warp::body::json())
        .and(with_store(store.clone()))
        .and_then(handler::create_bank_handler);

    let get_presentation = warp::path!("presentation" / u64)
        .and(warp::get())
        .and(with_store(store.clone()))
        .and_then(handler::get_presentation_handler);

    let get_poll = warp::path!("poll" / u64)
        .and(warp::get())
        .and(with_store(store.clone()))
        .and_then(handler::get_poll_handler);

    let get_bank = warp::path!("bank" / u64)
        .and(warp::get())
        .and(with_store(store.clone()))
        .and_then(handler::get_bank_handler);

    let list_content = warp::path!("content")
        .and(warp::get())
        .and(warp::header::<String>("authorization"))
        .and(with_config(config.clone()))
        .and(with_store(store.clone()))
        .and_then(handler::list_content_handler);

    let delete_content = warp::path!("content" / String / u64)
        .and(warp::delete())
        .and(warp::header::<String>("authorization"))
        .and(with_config(config.clone()))
        .and(with_store(store.clone()))
        .and_then(handler::delete_content_handler);

    let attendance_export = warp::path!("session" / u32 / "attendance.csv")
        .and(warp::get())
        .and(warp::header::<String>("authorization"))
        .and(with_config(config.clone()))
        .and(with_store(store.clone()))
        .and_then(handler::attendance_csv_handler);

    let leaderboard = warp::path!("session" / u32 / "leaderboard")
        .and(warp::get())
        .and(warp::header::optional::<String>("authorization"))
        .and(with_config(config.clone()))
        .and(with_store(store.clone()))
        .and_then(handler::leaderboard_handler);

    let ws_route = warp::path!("ws" / u32 / String)
        .and(warp::ws())
        .and(with_rooms(rooms.clone()))
        .and(with_store(store.clone()))
        .and_then(handler::ws_handler);

    let routes = health_route
        .or(stop_session)
        .or(create_session)
        .or(join)
        .or(create_presentation)
        .or(create_poll)
        .or(create_bank)
        .or(get_presentation)
        .or(get_poll)
        .or(get_bank)
        .or(list_content)
        .or(delete_content)
        .or(attendance_export)
        .or(leaderboard)
        .or(ws_route)
        .with(warp::cors().allow_any_origin())
        .recover(handler::handle_rejection);

    let address: SocketAddr = format!("{}:{}", config.service_address, config.service_port)
        .parse()
        .unwrap();

    warp::serve(routes).run(address).await;
}

fn with_store(store: Store) -> impl Filter<Extract = (Store,), Error = Infallible> + Clone {
    warp::any().map(move || store.clone())
}

fn with_rooms(rooms: Rooms) -> impl Filter<Extract = (Rooms,), Error = Infallible> + Clone {
    warp::any().map(move || rooms.clone())
}

fn with_config(
    config: Configuration,
) -> impl Filter<Extract = (Configuration,), Error = Infallible> + Clone {
    warp::any().map(move || config.clone())
}
