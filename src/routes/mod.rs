use actix_web::web;

pub mod comment;
pub mod cors;
pub mod follow;
pub mod post;
pub mod profile;
pub mod user;

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api")
            .service(web::scope("/user").configure(user::config))
            .service(web::scope("/profile").configure(profile::config))
            .service(web::scope("/post").configure(post::config))
            .service(web::scope("/comment").configure(comment::config))
            .service(web::scope("/follow").configure(follow::config)),
    );
}
