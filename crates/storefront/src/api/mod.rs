//! Typed endpoints of the bookstore API.
//!
//! Each submodule adds a group of methods to [`ApiClient`](crate::http::ApiClient)
//! and owns the wire shapes for its endpoints. Server quirks (alternate id
//! fields, product references that are sometimes ids and sometimes objects)
//! are normalized here, at decode time, so nothing downstream branches on
//! payload shape.
//!
//! | method | endpoint |
//! |---|---|
//! | `login` | `POST /auth/login` |
//! | `register` | `POST /auth/register` |
//! | `profile` | `GET /auth/profile` |
//! | `fetch_cart` | `GET /cart` |
//! | `add_cart_item` | `POST /cart` |
//! | `remove_cart_item` | `DELETE /cart/:productId` |
//! | `clear_server_cart` | `POST /cart/clear` |
//! | `list_products` | `GET /products` |
//! | `create_order` | `POST /orders` |
//! | `list_orders` | `GET /orders` |
//! | `get_order` | `GET /orders/:id` |

pub mod auth;
pub mod cart;
pub mod orders;
pub mod products;
mod wire;

pub use auth::Profile;
pub use cart::CartPayload;
pub use orders::{Order, OrderLine};
pub use products::Product;
