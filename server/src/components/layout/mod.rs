use maud::{html, Markup, Render};

pub struct Page {
    pub title: String,
    pub content: Box<dyn Render>,
}

impl Page {
    pub fn new(title: impl Into<String>, content: impl Render + 'static) -> Self {
        Self {
            title: title.into(),
            content: Box::new(content),
        }
    }
}

impl Render for Page {
    fn render(&self) -> Markup {
        html! {
            (maud::DOCTYPE)
            head {
                meta charset="utf-8";
                title { (self.title) }
                script src="https://unpkg.com/@tailwindcss/browser@4" {}
                meta name="viewport" content="width=device-width, initial-scale=1.0";
            }

            div class="min-h-screen bg-white md:bg-gradient-to-br md:from-violet-100 md:via-indigo-50 md:to-sky-100 py-4 md:py-8 px-0 sm:px-4 md:px-6 lg:px-8" {
                (self.content.render())

                div class="mt-6 md:mt-8 text-center text-sm" {
                    p class="text-gray-500" { "Herta Puppet Club" }
                }
            }
        }
    }
}

impl axum::response::IntoResponse for Page {
    fn into_response(self) -> axum::response::Response {
        self.render().into_response()
    }
}

pub struct Card {
    pub content: Box<dyn Render>,
}

impl Card {
    pub fn new(content: impl Render + 'static) -> Self {
        Self {
            content: Box::new(content),
        }
    }
}

impl Render for Card {
    fn render(&self) -> Markup {
        html! {
            div class="max-w-md mx-auto bg-white rounded-lg sm:rounded-xl md:rounded-2xl border border-gray-100 shadow-md sm:shadow-lg md:shadow-xl overflow-hidden w-full px-8 py-6 text-center" {
                (self.content.render())
            }
        }
    }
}
