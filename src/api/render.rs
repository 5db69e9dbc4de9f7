// crates.io
use axum::{
	http::StatusCode,
	response::{Html, IntoResponse, Response},
};

/// Terminal page shown in the browser after the provider redirects back.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CallbackPage {
	/// Code recorded; the initiating client can now redeem the request.
	Completed,
	/// The request expired before the provider redirected back.
	Expired,
	/// Unknown request, provider error, or missing code.
	Failed,
}
impl CallbackPage {
	/// HTTP status sent with the page.
	pub const fn status(self) -> StatusCode {
		match self {
			CallbackPage::Completed => StatusCode::OK,
			CallbackPage::Expired => StatusCode::GONE,
			CallbackPage::Failed => StatusCode::BAD_REQUEST,
		}
	}

	fn copy(self) -> (&'static str, &'static str) {
		match self {
			CallbackPage::Completed =>
				("Signed in", "You are signed in. You can close this window and return to the app."),
			CallbackPage::Expired =>
				("Link expired", "This sign-in link has expired. Start again from the app."),
			CallbackPage::Failed =>
				("Sign-in failed", "Something went wrong while signing you in. Start again from the app."),
		}
	}

	/// Renders the page body.
	pub fn render(self) -> String {
		let (title, message) = self.copy();

		format!(
			"<!DOCTYPE html>\n<html lang=\"en\">\n<head><meta charset=\"utf-8\"><title>{title}</title></head>\n<body><h1>{title}</h1><p>{message}</p></body>\n</html>\n"
		)
	}
}
impl IntoResponse for CallbackPage {
	fn into_response(self) -> Response {
		(self.status(), Html(self.render())).into_response()
	}
}
