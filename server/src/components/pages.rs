use maud::{html, Markup, Render};

use super::layout::{Card, Page};
use crate::puppets::PuppetAssignment;

struct Landing;

impl Render for Landing {
    fn render(&self) -> Markup {
        html! {
            h1 class="text-2xl font-bold text-gray-900" { "Join the Herta Puppet Club" }
            p class="mt-2 text-gray-600" {
                "Sign in with X and your account becomes the next numbered Herta puppet."
            }
            a href="/login"
              class="mt-6 inline-block rounded-lg bg-gray-900 px-5 py-2 font-semibold text-white hover:bg-gray-700" {
                "Login with X"
            }
        }
    }
}

pub fn landing_page() -> Page {
    Page::new("Herta Puppet Club", Card::new(Landing))
}

struct Confirmation {
    ordinal: String,
}

impl Render for Confirmation {
    fn render(&self) -> Markup {
        html! {
            h1 class="text-2xl font-bold text-gray-900" {
                "You're now Herta Puppet #" (self.ordinal) "!"
            }
            p class="mt-2 text-gray-600" { "Check your X profile 👀" }
        }
    }
}

pub fn confirmation_page(assignment: &PuppetAssignment) -> Page {
    Page::new(
        assignment.display_name(),
        Card::new(Confirmation {
            ordinal: assignment.ordinal.to_string(),
        }),
    )
}
