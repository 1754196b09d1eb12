mod callback;
mod login;
mod redirect;

pub use callback::callback;
pub use login::login;
pub use redirect::redirect;
